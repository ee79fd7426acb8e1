use hoop_scene::config::SceneConfig;

fn main() -> anyhow::Result<()> {
    let config = SceneConfig::load_or_default("scene.toml")?;
    hoop_scene::run(config)
}
