//! Kiln Runtime
//!
//! Brings up a render context against the simulated driver and presents one frame.
//!
//! Usage: `kiln [settings.json] [driver-profile.json]`

use anyhow::{Context, Result};
use kiln_context::sim::{DriverProfile, HeadlessWindows, SimulatedDriver};
use kiln_context::{LogPolicy, RenderContext};
use kiln_services::Settings;

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    tracing::info!("Kiln v{}", kiln_context::VERSION);

    let mut args = std::env::args().skip(1);
    let settings = match args.next() {
        Some(path) => Settings::load(&path)
            .with_context(|| format!("loading settings from {path}"))?,
        None => Settings::default(),
    };
    let profile = match args.next() {
        Some(path) => load_profile(&path)?,
        None => DriverProfile::default(),
    };
    tracing::info!(
        vendor = %profile.vendor,
        configs = profile.configs.len(),
        "using simulated driver"
    );

    let mut driver = SimulatedDriver::new(profile);
    let mut windows = HeadlessWindows::new();
    let mut log = if settings.context.verbose {
        LogPolicy::verbose_once()
    } else {
        LogPolicy::quiet()
    };

    {
        let mut context = RenderContext::create(
            &mut driver,
            &mut windows,
            &settings.context.request,
            settings.window.width,
            settings.window.height,
            &mut log,
        )
        .context("creating render context")?;

        if let Some(negotiated) = context.negotiated() {
            let attrs = &negotiated.attributes;
            tracing::info!(
                title = %settings.window.title,
                api = %negotiated.api,
                config_id = negotiated.config_id,
                iterations = negotiated.iterations,
                relaxed = ?negotiated.relaxed,
                "context granted: R{}G{}B{}A{} depth {} stencil {} samples {}",
                attrs.red_bits,
                attrs.green_bits,
                attrs.blue_bits,
                attrs.alpha_bits,
                attrs.depth_bits,
                attrs.stencil_bits,
                attrs.aa_samples,
            );
        }

        context.swap_buffers().context("presenting frame")?;
    }

    let stats = driver.stats();
    tracing::info!(
        contexts_created = stats.contexts_created,
        frames_presented = stats.frames_presented,
        "shutdown complete"
    );
    Ok(())
}

fn load_profile(path: &str) -> Result<DriverProfile> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading driver profile {path}"))?;
    serde_json::from_str(&json).with_context(|| format!("parsing driver profile {path}"))
}
