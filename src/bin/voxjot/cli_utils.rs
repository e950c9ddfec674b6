use anyhow::Result;
use voxjot::audio::CpalSource;

pub(crate) fn list_input_devices() -> Result<()> {
    // VOXJOT_TEST_DEVICES is honored inside list_devices for testing.
    let devices = CpalSource::list_devices().unwrap_or_else(|err| {
        eprintln!("Failed to list audio input devices: {err}");
        Vec::new()
    });

    if devices.is_empty() {
        println!("No audio input devices detected.");
    } else {
        println!("Available audio input devices:");
        for name in devices {
            println!("  - {name}");
        }
    }
    Ok(())
}
