use squelch_recorder::audio;

/// Print `[index] name` for each input device, the same indices
/// `--input-device` accepts.
pub(crate) fn list_input_devices() {
    // SQUELCH_TEST_DEVICES stands in for real hardware in tests.
    let devices = if let Ok(raw) = std::env::var("SQUELCH_TEST_DEVICES") {
        raw.split(',')
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect()
    } else {
        audio::Recorder::list_devices().unwrap_or_else(|err| {
            eprintln!("Failed to list audio input devices: {err:#}");
            Vec::new()
        })
    };

    if devices.is_empty() {
        println!("No audio input devices detected.");
        return;
    }
    println!("Available audio input devices:");
    for (index, name) in devices.iter().enumerate() {
        println!("  [{index}] {name}");
    }
}
