fn main() -> anyhow::Result<()> {
    quickai_lib::run()
}
