fn main() {
    #[cfg(feature = "cli")]
    tscodec::cli::run();

    #[cfg(not(feature = "cli"))]
    {
        eprintln!("tscodec: CLI not enabled. Rebuild with `--features cli`.");
        std::process::exit(1);
    }
}
