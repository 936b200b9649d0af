use std::io::Write;

use fat12::{Console, MountOptions, RamDisk, ReadTarget, Volume};

/// Logs to stderr so file contents on stdout stay clean.
struct Logger;

static LOGGER: Logger = Logger;

impl log::Log for Logger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if self.enabled(record.metadata()) {
            let color = match record.level() {
                log::Level::Error => 31,
                log::Level::Warn => 33,
                log::Level::Info => 32,
                // White is actually kinda grey. Bright white is white.
                log::Level::Debug | log::Level::Trace => 37,
            };
            eprintln!("\x1B[{color}m[{}]\x1B[0m {}", record.level(), record.args());
        }
    }

    fn flush(&self) {}
}

struct Stdout(std::io::Stdout);

impl Console for Stdout {
    fn write_bytes(&mut self, bytes: &[u8]) {
        if let Err(err) = self.0.write_all(bytes) {
            log::error!("failed to write to stdout: {err}");
        }
    }
}

fn main() {
    let mut args: Vec<String> = std::env::args().collect();
    let verbose = args.iter().any(|arg| arg == "-v");
    args.retain(|arg| arg != "-v");
    let (disk_file, path) = match &args[..] {
        [_, disk_file] => (disk_file, "/"),
        [_, disk_file, path] => (disk_file, path.as_str()),
        _ => {
            eprintln!("Usage: {} [-v] <disk_file> [path]", args[0]);
            std::process::exit(1);
        }
    };

    log::set_logger(&LOGGER).expect("logger already set");
    log::set_max_level(if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    });

    log::info!("Reading FAT12 disk file: {disk_file}");
    let image = std::fs::read(disk_file).expect("failed to read disk file");
    let boot_sector = fat12::BootSector::parse(&image).unwrap_or_else(|err| fail(err));
    let geometry = boot_sector.geometry().unwrap_or_else(|err| fail(err));
    let firmware = RamDisk::new(image, geometry.disk_parameters(), geometry.sector_size());

    let mut volume = Volume::mount(firmware, MountOptions::default()).unwrap_or_else(|err| fail(err));
    let boot_sector = volume.boot_sector();
    log::info!(
        "OEM name: {}, volume label: {}, media descriptor: {:#04X}",
        boot_sector.oem_name(),
        boot_sector.volume_label().unwrap_or("<none>"),
        volume.geometry().media_descriptor
    );

    let list = path == "/" || volume.resolve(path).is_ok_and(|entry| entry.is_dir());
    if list {
        let entries = volume.list_directory(path).unwrap_or_else(|err| fail(err));
        for entry in entries {
            let kind = if entry.is_dir() {
                String::from("<dir>")
            } else {
                format!("<file> {}", entry.size)
            };
            println!(
                "{:<12} {kind:<14} {} {}",
                entry.name.to_string(),
                entry.last_write_time,
                entry.last_write_date
            );
        }
    } else {
        let file = volume.open(path).unwrap_or_else(|err| fail(err));
        let mut stdout = Stdout(std::io::stdout());
        volume
            .read(&file, ReadTarget::Console(&mut stdout))
            .unwrap_or_else(|err| fail(err));
        file.close();
    }
}

fn fail(err: fat12::Error) -> ! {
    log::error!("{err}");
    std::process::exit(1);
}
