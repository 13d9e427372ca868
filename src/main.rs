fn main() -> anyhow::Result<()> {
    luka_lib::run()
}
