fn main() -> anyhow::Result<()> {
    pushlock_lib::run()
}
