fn main() -> anyhow::Result<()> {
    let config_path = std::env::args_os().nth(1).map(std::path::PathBuf::from);
    pose_signal_lib::run(config_path)
}
