fn main() -> anyhow::Result<()> {
    gallery_query::run()
}
