//! Serial port discovery and handshake probing
//!
//! Provides port enumeration filtered to the USB-serial patterns the rig's
//! control board shows up as, and the probe used to find a responsive
//! `(port, baud)` pair when no saved connection works.

use colonypick_core::{ConnectionError, Error, Result};
use std::io::{Read, Write};
use std::time::{Duration, Instant};

/// Baud rates tried during a scan, in order of likelihood
pub const BAUD_CANDIDATES: [u32; 3] = [250_000, 125_000, 500_000];

/// How long a probe waits for the firmware to echo anything
const PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct SerialPortInfo {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    pub port_name: String,

    /// Port description (e.g., "USB Serial Port")
    pub description: String,
}

/// List available serial ports on the system
///
/// Filters ports to the patterns a USB control board appears under:
/// - Windows: COM* (e.g., COM1, COM3)
/// - Linux: /dev/ttyUSB*, /dev/ttyACM*
/// - macOS: /dev/cu.usbserial-*, /dev/cu.usbmodem*
pub fn list_ports() -> Result<Vec<SerialPortInfo>> {
    match serialport::available_ports() {
        Ok(ports) => Ok(ports
            .iter()
            .filter(|port| is_candidate_port(&port.port_name))
            .map(|port| SerialPortInfo {
                port_name: port.port_name.clone(),
                description: describe_port(port),
            })
            .collect()),
        Err(e) => {
            tracing::error!("Failed to enumerate serial ports: {}", e);
            Err(Error::other(format!("Failed to enumerate ports: {}", e)))
        }
    }
}

/// Check if a port name matches a control-board pattern
fn is_candidate_port(port_name: &str) -> bool {
    if port_name.starts_with("COM") && port_name[3..].chars().all(|c| c.is_ascii_digit()) {
        return true;
    }

    if port_name.starts_with("/dev/ttyUSB") || port_name.starts_with("/dev/ttyACM") {
        return true;
    }

    if port_name.starts_with("/dev/cu.usbserial-") || port_name.starts_with("/dev/cu.usbmodem") {
        return true;
    }

    false
}

/// Get a user-friendly description for a port
fn describe_port(port: &serialport::SerialPortInfo) -> String {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb_info) => {
            format!(
                "USB {} {}",
                usb_info.manufacturer.as_deref().unwrap_or("Device"),
                usb_info.product.as_deref().unwrap_or("Serial Port")
            )
        }
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        _ => "Serial Port".to_string(),
    }
}

/// Probe one `(port, baud)` pair: open it, send a bare newline, and accept
/// the pair if the firmware echoes any bytes within a second.
pub fn probe(port_name: &str, baud: u32) -> bool {
    let mut port = match serialport::new(port_name, baud)
        .timeout(Duration::from_millis(50))
        .open_native()
    {
        Ok(port) => port,
        Err(e) => {
            tracing::debug!("Probe open failed for {} @ {}: {}", port_name, baud, e);
            return false;
        }
    };

    if port.write_all(b"\n").and_then(|_| port.flush()).is_err() {
        return false;
    }

    let deadline = Instant::now() + PROBE_TIMEOUT;
    let mut chunk = [0u8; 64];
    while Instant::now() < deadline {
        match port.read(&mut chunk) {
            Ok(n) if n > 0 => {
                tracing::debug!("Probe hit on {} @ {}", port_name, baud);
                return true;
            }
            Ok(_) => {}
            Err(e)
                if e.kind() == std::io::ErrorKind::TimedOut
                    || e.kind() == std::io::ErrorKind::WouldBlock => {}
            Err(_) => return false,
        }
    }
    false
}

/// Scan every candidate port against every candidate baud rate.
///
/// Returns the first pair that answers the probe.
pub fn find_device() -> Result<(String, u32)> {
    for port in list_ports()? {
        for baud in BAUD_CANDIDATES {
            if probe(&port.port_name, baud) {
                return Ok((port.port_name, baud));
            }
        }
    }
    Err(ConnectionError::NoDeviceFound.into())
}
