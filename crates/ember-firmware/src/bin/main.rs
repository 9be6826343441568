#![no_std]
#![no_main]
#![deny(
    clippy::mem_forget,
    reason = "mem::forget is generally not safe to do with esp_hal types, especially those \
    holding buffers for the duration of a data transfer."
)]
#![deny(clippy::large_stack_frames)]

use embassy_executor::Spawner;
use embassy_time::Delay;
use esp_hal::clock::CpuClock;
use esp_hal::timer::timg::TimerGroup;
use log::{LevelFilter, error, info};

use ember_core::{AnalogReader, AppError, Monitor, MonitorConfig, SnapshotCell};
use ember_firmware::hardware::{EspAdc, alarm_outputs};
use ember_firmware::{config_overrides, http, wifi};

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    rtt_target::rprintln!("PANIC: {}", info);
    loop {}
}

extern crate alloc;

// This creates a default app-descriptor required by the esp-idf bootloader.
// For more information see: <https://docs.espressif.com/projects/esp-idf/en/stable/esp32/api-reference/system/app_image_format.html#application-description>
esp_bootloader_esp_idf::esp_app_desc!();

/// Latest readings; the monitor writes, the HTTP workers read.
static SNAPSHOT: SnapshotCell = SnapshotCell::new();

#[allow(
    clippy::large_stack_frames,
    reason = "it's not unusual to allocate larger buffers etc. in main"
)]
#[esp_rtos::main]
async fn main(spawner: Spawner) -> ! {
    rtt_target::rtt_init_log!(LevelFilter::Info);

    let config = esp_hal::Config::default().with_cpu_clock(CpuClock::max());
    let peripherals = esp_hal::init(config);

    esp_alloc::heap_allocator!(#[esp_hal::ram(reclaimed)] size: 73744);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    info!("Embassy initialized");

    let config = match MonitorConfig::from_overrides(config_overrides()) {
        Ok(config) => config,
        Err(e) => panic!("{}", AppError::from(e)),
    };

    let reader = match EspAdc::new(
        peripherals.ADC1,
        peripherals.GPIO4,
        peripherals.GPIO5,
        config.adc,
    )
    .and_then(|adc| AnalogReader::init(adc, config.adc))
    {
        Ok(reader) => reader,
        Err(e) => panic!("{}", AppError::from(e)),
    };
    let outputs = alarm_outputs(peripherals.GPIO6, peripherals.GPIO7, peripherals.GPIO15);
    let mut monitor = match Monitor::new(&config, reader, outputs, &SNAPSHOT) {
        Ok(monitor) => monitor,
        Err(e) => panic!("{}", AppError::from(e)),
    };

    // The alarm works without the network, so a failed bring-up is only logged
    match wifi::start(&spawner, peripherals.WIFI)
        .and_then(|stack| http::spawn_workers(&spawner, stack, &SNAPSHOT))
    {
        Ok(()) => info!("Network tasks started"),
        Err(e) => error!("Status page unavailable: {}", e),
    }

    monitor.run(&mut Delay).await
}
