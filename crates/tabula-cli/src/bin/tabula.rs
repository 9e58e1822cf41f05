fn main() -> anyhow::Result<()> {
    tabula_cli::cli::run()
}
