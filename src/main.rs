use orbit_viewer::ViewerConfig;

fn main() -> anyhow::Result<()> {
    orbit_viewer::run(ViewerConfig::default())
}
