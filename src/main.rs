fn main() -> anyhow::Result<()> {
    inventory_voice_lib::run()
}
