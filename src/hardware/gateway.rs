//! Carrier-detect / PTT gateway over the CM108 HID interface.
//!
//! # Overview
//!
//! [`CarrierPtt`] is the capability the relay logic programs against.  It is
//! object-safe and `Send + Sync` so it can be held behind an
//! `Arc<dyn CarrierPtt>` shared by the polling thread and the state machine.
//!
//! [`Cm108Gateway`] is the production implementation that drives a C-Media
//! CM108-family USB sound fob.  The fob exposes a HID interface whose GPIO
//! lines carry the two radio control signals: carrier detect arrives in the
//! 4-byte interrupt input report (bit `0x02` of byte 0), and PTT is driven
//! by a SET_REPORT control transfer toggling GPIO 3 (`0x04` in the mask and
//! data bytes).
//!
//! [`DisconnectedGateway`] keeps the repeater alive when no fob is present:
//! every operation is a failing no-op, so audio keeps flowing even though
//! nothing can be keyed.
//!
//! [`MockGateway`] (under `#[cfg(test)]`) records PTT writes and serves a
//! scripted carrier line for hardware-free tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use rusb::constants::LIBUSB_CLASS_HID;
use rusb::{DeviceHandle, Direction, GlobalContext, TransferType};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Protocol constants
// ---------------------------------------------------------------------------

/// HID class request: SET_REPORT, host-to-device, class, interface.
const REQUEST_TYPE_SET_REPORT: u8 = 0x21;
/// bRequest for SET_REPORT.
const HID_SET_REPORT: u8 = 0x09;
/// wValue: output report, report id 0.
const HID_REPORT_OUTPUT: u16 = 0x0200;
/// GPIO line carrying PTT, in both the mask and data bytes.
const GPIO_PTT: u8 = 0x04;
/// Carrier-detect bit in byte 0 of the input report.
const CARRIER_BIT: u8 = 0x02;
/// Timeout for the PTT control transfer.
const PTT_TIMEOUT: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// HardwareError
// ---------------------------------------------------------------------------

/// Errors raised by the hardware gateway.
#[derive(Debug, Error)]
pub enum HardwareError {
    /// No device with the configured VID/PID is attached.
    #[error("device {vendor_id:04x}:{product_id:04x} not found")]
    DeviceNotFound { vendor_id: u16, product_id: u16 },

    /// The device has no HID interface with an interrupt IN endpoint.
    #[error("no usable HID interface on the device")]
    HidInterfaceNotFound,

    /// Detaching the kernel driver or claiming the interface failed.
    #[error("failed to claim HID interface: {0}")]
    InterfaceClaimFailed(rusb::Error),

    /// A PTT control transfer failed; retried on the next call.
    #[error("USB transfer failed: {0}")]
    Transfer(rusb::Error),

    /// The gateway is running in disconnected (no-op) mode.
    #[error("hardware gateway is disconnected")]
    Disconnected,
}

// ---------------------------------------------------------------------------
// CarrierPtt trait
// ---------------------------------------------------------------------------

/// Object-safe, thread-safe interface to the carrier-detect/PTT hardware.
///
/// # Contract
///
/// - `set_ptt` is idempotent and safe to call redundantly; every assert must
///   be paired with an eventual deassert by the caller.
/// - `poll_carrier` never blocks past `timeout`; a timed-out read returns
///   the previously observed value rather than a synthesized transition.
pub trait CarrierPtt: Send + Sync {
    /// Drive the PTT line.
    fn set_ptt(&self, active: bool) -> Result<(), HardwareError>;

    /// Read the debounced carrier-detect line.
    fn poll_carrier(&self, timeout: Duration) -> bool;

    /// `true` when real hardware is attached and claimed.
    fn is_connected(&self) -> bool;
}

// Compile-time assertion: Box<dyn CarrierPtt> must be constructible.
const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn CarrierPtt>) {}
};

// ---------------------------------------------------------------------------
// Cm108Gateway
// ---------------------------------------------------------------------------

/// Production gateway driving a CM108-family USB sound fob.
pub struct Cm108Gateway {
    handle: DeviceHandle<GlobalContext>,
    interface: u8,
    endpoint_in: u8,
    detached_kernel_driver: bool,
    last_carrier: AtomicBool,
}

impl std::fmt::Debug for Cm108Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cm108Gateway")
            .field("interface", &self.interface)
            .field("endpoint_in", &self.endpoint_in)
            .finish_non_exhaustive()
    }
}

impl Cm108Gateway {
    /// Locate the fob by VID/PID and claim its HID interface.
    ///
    /// A kernel driver bound to the interface is detached first and restored
    /// on drop.
    ///
    /// # Errors
    ///
    /// [`HardwareError::DeviceNotFound`] when no matching device is
    /// attached, [`HardwareError::HidInterfaceNotFound`] when the device
    /// lacks a HID interface with an interrupt IN endpoint, and
    /// [`HardwareError::InterfaceClaimFailed`] when the claim itself fails.
    pub fn open(vendor_id: u16, product_id: u16) -> Result<Self, HardwareError> {
        let mut handle = rusb::open_device_with_vid_pid(vendor_id, product_id).ok_or(
            HardwareError::DeviceNotFound {
                vendor_id,
                product_id,
            },
        )?;

        let (interface, endpoint_in) = find_hid_interface(&handle)?;

        let detached = match handle.kernel_driver_active(interface) {
            Ok(true) => {
                handle
                    .detach_kernel_driver(interface)
                    .map_err(HardwareError::InterfaceClaimFailed)?;
                true
            }
            // NotSupported on platforms without kernel-driver management.
            Ok(false) | Err(_) => false,
        };

        handle
            .claim_interface(interface)
            .map_err(HardwareError::InterfaceClaimFailed)?;

        log::info!(
            "CM108 connected ({vendor_id:04x}:{product_id:04x}), HID interface {interface} claimed"
        );

        Ok(Self {
            handle,
            interface,
            endpoint_in,
            detached_kernel_driver: detached,
            last_carrier: AtomicBool::new(false),
        })
    }
}

/// Find the HID interface and its interrupt IN endpoint.
fn find_hid_interface(
    handle: &DeviceHandle<GlobalContext>,
) -> Result<(u8, u8), HardwareError> {
    let config = handle
        .device()
        .active_config_descriptor()
        .map_err(HardwareError::InterfaceClaimFailed)?;

    for interface in config.interfaces() {
        for descriptor in interface.descriptors() {
            if descriptor.class_code() != LIBUSB_CLASS_HID {
                continue;
            }
            let endpoint = descriptor.endpoint_descriptors().find(|e| {
                e.direction() == Direction::In && e.transfer_type() == TransferType::Interrupt
            });
            if let Some(endpoint) = endpoint {
                return Ok((descriptor.interface_number(), endpoint.address()));
            }
        }
    }
    Err(HardwareError::HidInterfaceNotFound)
}

impl CarrierPtt for Cm108Gateway {
    fn set_ptt(&self, active: bool) -> Result<(), HardwareError> {
        let gpio_data = if active { GPIO_PTT } else { 0x00 };
        let report = [0x00, GPIO_PTT, gpio_data, 0x00];

        match self.handle.write_control(
            REQUEST_TYPE_SET_REPORT,
            HID_SET_REPORT,
            HID_REPORT_OUTPUT,
            self.interface as u16,
            &report,
            PTT_TIMEOUT,
        ) {
            Ok(_) => {
                log::debug!("PTT {}", if active { "asserted" } else { "released" });
                Ok(())
            }
            Err(e) => Err(HardwareError::Transfer(e)),
        }
    }

    fn poll_carrier(&self, timeout: Duration) -> bool {
        let mut report = [0u8; 4];
        match self
            .handle
            .read_interrupt(self.endpoint_in, &mut report, timeout)
        {
            Ok(n) if n > 0 => {
                let carrier = report[0] & CARRIER_BIT != 0;
                self.last_carrier.store(carrier, Ordering::Relaxed);
                carrier
            }
            // A timed-out or empty read must not fabricate an edge.
            Ok(_) | Err(rusb::Error::Timeout) => self.last_carrier.load(Ordering::Relaxed),
            Err(e) => {
                log::debug!("carrier read failed: {e}");
                self.last_carrier.store(false, Ordering::Relaxed);
                false
            }
        }
    }

    fn is_connected(&self) -> bool {
        true
    }
}

impl Drop for Cm108Gateway {
    fn drop(&mut self) {
        // PTT must never stay asserted past teardown.
        let _ = self.set_ptt(false);

        if let Err(e) = self.handle.release_interface(self.interface) {
            log::warn!("failed to release HID interface: {e}");
        }
        if self.detached_kernel_driver {
            if let Err(e) = self.handle.attach_kernel_driver(self.interface) {
                log::warn!("failed to restore kernel driver: {e}");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// DisconnectedGateway
// ---------------------------------------------------------------------------

/// Gateway used when no fob could be opened: the repeater runs without
/// carrier detect or PTT instead of crashing.
#[derive(Debug, Default)]
pub struct DisconnectedGateway;

impl CarrierPtt for DisconnectedGateway {
    fn set_ptt(&self, _active: bool) -> Result<(), HardwareError> {
        Err(HardwareError::Disconnected)
    }

    fn poll_carrier(&self, _timeout: Duration) -> bool {
        false
    }

    fn is_connected(&self) -> bool {
        false
    }
}

// ---------------------------------------------------------------------------
// MockGateway  (test double)
// ---------------------------------------------------------------------------

/// Scripted gateway for tests: PTT writes are logged, the carrier line is a
/// flag the test flips.
#[cfg(test)]
pub struct MockGateway {
    pub ptt_log: std::sync::Mutex<Vec<bool>>,
    pub carrier: AtomicBool,
}

#[cfg(test)]
impl MockGateway {
    pub fn new() -> Self {
        Self {
            ptt_log: std::sync::Mutex::new(Vec::new()),
            carrier: AtomicBool::new(false),
        }
    }

    pub fn ptt_calls(&self) -> Vec<bool> {
        self.ptt_log.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl CarrierPtt for MockGateway {
    fn set_ptt(&self, active: bool) -> Result<(), HardwareError> {
        self.ptt_log.lock().unwrap().push(active);
        Ok(())
    }

    fn poll_carrier(&self, _timeout: Duration) -> bool {
        self.carrier.load(Ordering::Relaxed)
    }

    fn is_connected(&self) -> bool {
        true
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
