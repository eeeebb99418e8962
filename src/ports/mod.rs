cfg_if::cfg_if! {
    if #[cfg(unix)] {
        pub mod posix;
    } else {
        compile_error!("strand has no port for this platform; only POSIX hosts are supported");
    }
}
