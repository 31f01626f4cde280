//! Register address spaces of the KV260 + P3S7 peripheral window.
//!
//! The device exposes four disjoint register namespaces. Three of them have
//! their own wire operations (`*SysReg`, `*CamReg`, `*SensorReg`); the timing
//! generator block has none and is reached through the system window at
//! [`TIMING_WINDOW_BASE`].
//!
//! Addresses are typed by namespace so a camera offset cannot be handed to the
//! system bank by accident:
//!
//! ```compile_fail
//! use p3s7_core::registers::{CameraRegister, RegisterAddress, SystemSpace};
//! let addr: RegisterAddress<SystemSpace> = CameraRegister::SensorEnable.into();
//! ```

use std::fmt;
use std::marker::PhantomData;

use tracing::debug;

use crate::channel::ControlChannel;
use crate::error::ControlResult;
use crate::outcome::Outcome;

/// Offset of the timing generator block inside the system register window.
///
/// The block sits at byte `0x0001_0000` of the peripheral window and
/// registers are laid out on an 8-byte stride.
pub const TIMING_WINDOW_BASE: u16 = 0x2000;

/// The four register namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// KV260 system registers.
    System,
    /// Camera module (FPGA receiver) registers.
    Camera,
    /// PYTHON300 sensor SPI registers.
    Sensor,
    /// Timing generator block.
    Timing,
}

impl Namespace {
    /// Map a namespace-relative offset to the wire port and address it
    /// travels on. Returns `None` when the offset cannot be expressed on the
    /// wire (timing offsets past the end of the system window).
    #[must_use]
    pub fn route(self, offset: u16) -> Option<(RegisterPort, u16)> {
        match self {
            Self::System => Some((RegisterPort::System, offset)),
            Self::Camera => Some((RegisterPort::Camera, offset)),
            Self::Sensor => Some((RegisterPort::Sensor, offset)),
            Self::Timing => TIMING_WINDOW_BASE
                .checked_add(offset)
                .map(|addr| (RegisterPort::System, addr)),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::System => "system",
            Self::Camera => "camera",
            Self::Sensor => "sensor",
            Self::Timing => "timing",
        };
        f.write_str(name)
    }
}

/// Register families that have their own wire operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterPort {
    /// `ReadSysReg` / `WriteSysReg`.
    System,
    /// `ReadCamReg` / `WriteCamReg`.
    Camera,
    /// `ReadSensorReg` / `WriteSensorReg`.
    Sensor,
}

impl RegisterPort {
    /// Name of the read operation on the wire.
    #[must_use]
    pub const fn read_operation(self) -> &'static str {
        match self {
            Self::System => "ReadSysReg",
            Self::Camera => "ReadCamReg",
            Self::Sensor => "ReadSensorReg",
        }
    }

    /// Name of the write operation on the wire.
    #[must_use]
    pub const fn write_operation(self) -> &'static str {
        match self {
            Self::System => "WriteSysReg",
            Self::Camera => "WriteCamReg",
            Self::Sensor => "WriteSensorReg",
        }
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Compile-time marker for a register namespace.
pub trait RegisterSpace:
    sealed::Sealed + Copy + fmt::Debug + PartialEq + Eq + std::hash::Hash + Send + Sync + 'static
{
    /// Runtime tag of this namespace.
    const NAMESPACE: Namespace;
}

macro_rules! register_space {
    ($($(#[$meta:meta])* $name:ident => $ns:ident;)+) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub struct $name;

            impl sealed::Sealed for $name {}

            impl RegisterSpace for $name {
                const NAMESPACE: Namespace = Namespace::$ns;
            }
        )+
    };
}

register_space! {
    /// System register namespace.
    SystemSpace => System;
    /// Camera module register namespace.
    CameraSpace => Camera;
    /// Sensor SPI register namespace.
    SensorSpace => Sensor;
    /// Timing generator register namespace.
    TimingSpace => Timing;
}

/// A 16-bit register offset bound to one namespace.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RegisterAddress<S> {
    offset: u16,
    _space: PhantomData<S>,
}

impl<S: RegisterSpace> RegisterAddress<S> {
    /// Raw offset in this namespace, for registers outside the named table.
    #[must_use]
    pub const fn new(offset: u16) -> Self {
        Self {
            offset,
            _space: PhantomData,
        }
    }

    /// Namespace-relative offset.
    #[must_use]
    pub const fn offset(self) -> u16 {
        self.offset
    }

    /// Namespace this address belongs to.
    #[must_use]
    pub const fn namespace(self) -> Namespace {
        S::NAMESPACE
    }
}

impl<S: RegisterSpace> fmt::Debug for RegisterAddress<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:#06x}", S::NAMESPACE, self.offset)
    }
}

impl<S: RegisterSpace> fmt::Display for RegisterAddress<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

macro_rules! register_map {
    (
        $(#[$meta:meta])*
        $name:ident in $space:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $offset:literal => $label:literal, )+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u16)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $offset, )+
        }

        impl $name {
            /// Every named register, in address order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Offset within the namespace.
            #[must_use]
            pub const fn offset(self) -> u16 {
                self as u16
            }

            /// Register name as used in the hardware documentation.
            #[must_use]
            pub const fn name(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }

            /// Look a named register up by offset.
            #[must_use]
            pub fn from_offset(offset: u16) -> Option<Self> {
                Self::ALL.iter().copied().find(|r| r.offset() == offset)
            }
        }

        impl From<$name> for RegisterAddress<$space> {
            fn from(register: $name) -> Self {
                RegisterAddress::new(register.offset())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.name())
            }
        }
    };
}

register_map! {
    /// KV260 system registers.
    SystemRegister in SystemSpace {
        /// Core identification.
        Id = 0x0000 => "id",
        /// D-PHY software reset.
        DphySwReset = 0x0001 => "dphySwReset",
        /// Camera power enable.
        CamEnable = 0x0002 => "camEnable",
        /// MIPI CSI-2 data type.
        CsiDataType = 0x0003 => "csiDataType",
        /// D-PHY initialization done flag.
        DphyInitDone = 0x0004 => "dphyInitDone",
        /// Frame interval counter, 250 MHz ticks.
        FpsCount = 0x0006 => "fpsCount",
        /// Received frame counter.
        FrameCount = 0x0007 => "frameCount",
        /// Capture width for the image channel.
        ImageWidth = 0x0008 => "imageWidth",
        /// Capture height for the image channel.
        ImageHeight = 0x0009 => "imageHeight",
        /// Capture width for the black channel.
        BlackWidth = 0x000A => "blackWidth",
        /// Capture height for the black channel.
        BlackHeight = 0x000B => "blackHeight",
    }
}

register_map! {
    /// Camera module registers.
    CameraRegister in CameraSpace {
        /// Core identification.
        CoreId = 0x0000 => "coreId",
        /// Core version.
        CoreVersion = 0x0001 => "coreVersion",
        /// Sensor power enable.
        SensorEnable = 0x0004 => "sensorEnable",
        /// Sensor ready flag.
        SensorReady = 0x0008 => "sensorReady",
        /// Receiver reset.
        RecvReset = 0x0010 => "recvReset",
        /// Lane alignment reset.
        AlignReset = 0x0020 => "alignReset",
        /// Lane alignment training pattern.
        AlignPattern = 0x0022 => "alignPattern",
        /// Lane alignment status.
        AlignStatus = 0x0028 => "alignStatus",
        /// D-PHY core reset.
        DphyCoreReset = 0x0080 => "dphyCoreReset",
        /// D-PHY system reset.
        DphySysReset = 0x0081 => "dphySysReset",
        /// D-PHY initialization done flag.
        DphyInitDone = 0x0088 => "dphyInitDone",
    }
}

register_map! {
    /// Timing generator registers.
    TimingRegister in TimingSpace {
        /// Core identification.
        CoreId = 0x0000 => "coreId",
        /// Core version.
        CoreVersion = 0x0001 => "coreVersion",
        /// Control word; bit 0 enables the generator.
        CtlControl = 0x0004 => "ctlControl",
        /// Status word.
        CtlStatus = 0x0005 => "ctlStatus",
        /// Free-running timer.
        CtlTimer = 0x0008 => "ctlTimer",
        /// Trigger period in 10 ns ticks.
        ParamPeriod = 0x0010 => "paramPeriod",
        /// Trigger 0 assert tick.
        ParamTrig0Start = 0x0020 => "paramTrig0Start",
        /// Trigger 0 deassert tick.
        ParamTrig0End = 0x0021 => "paramTrig0End",
        /// Trigger 0 polarity.
        ParamTrig0Pol = 0x0022 => "paramTrig0Pol",
    }
}

register_map! {
    /// PYTHON300 sensor registers used by the control plane.
    SensorRegister in SensorSpace {
        /// Chip identification.
        ChipId = 0 => "chipId",
        /// General configuration; see the `SENSOR_CONFIG_*` bits.
        GeneralConfig = 192 => "generalConfiguration",
        /// Exposure timer multiplier.
        MultTimer = 199 => "multTimer",
        /// Frame length.
        FrLength = 200 => "frLength",
        /// Exposure in timer units.
        Exposure = 201 => "exposure",
    }
}

/// Sequencer enable bit of [`SensorRegister::GeneralConfig`].
pub const SENSOR_CONFIG_ENABLE: u32 = 1 << 0;
/// Triggered-mode bit of [`SensorRegister::GeneralConfig`].
pub const SENSOR_CONFIG_TRIGGERED: u32 = 1 << 4;
/// Slave-mode bit of [`SensorRegister::GeneralConfig`].
pub const SENSOR_CONFIG_SLAVE: u32 = 1 << 5;

/// Number of addressable sensor SPI registers.
pub const SENSOR_REGISTER_COUNT: u16 = 512;

/// Read/write view of one register namespace over a borrowed channel.
///
/// No range checking happens here. Offsets the device does not implement come
/// back as [`Outcome::Rejected`].
pub struct RegisterBank<'a, C: ?Sized, S> {
    channel: &'a mut C,
    _space: PhantomData<S>,
}

impl<'a, C, S> RegisterBank<'a, C, S>
where
    C: ControlChannel + ?Sized,
    S: RegisterSpace,
{
    /// Create a bank view over `channel`.
    pub fn new(channel: &'a mut C) -> Self {
        Self {
            channel,
            _space: PhantomData,
        }
    }

    /// Namespace served by this bank.
    #[must_use]
    pub fn namespace(&self) -> Namespace {
        S::NAMESPACE
    }

    /// Read one register.
    pub async fn read(
        &mut self,
        address: impl Into<RegisterAddress<S>> + Send,
    ) -> ControlResult<Outcome<u32>> {
        let address = address.into();
        let Some((port, wire)) = S::NAMESPACE.route(address.offset()) else {
            debug!(%address, "register offset outside the wire window");
            return Ok(Outcome::Rejected);
        };

        let outcome = self.channel.read_register(port, wire).await?;
        debug!(%address, wire, ?outcome, "register read");
        Ok(outcome)
    }

    /// Write one register.
    pub async fn write(
        &mut self,
        address: impl Into<RegisterAddress<S>> + Send,
        value: u32,
    ) -> ControlResult<Outcome<()>> {
        let address = address.into();
        let Some((port, wire)) = S::NAMESPACE.route(address.offset()) else {
            debug!(%address, "register offset outside the wire window");
            return Ok(Outcome::Rejected);
        };

        let outcome = self.channel.write_register(port, wire, value).await?;
        debug!(%address, wire, value, ?outcome, "register write");
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_offsets_route_through_system_window() {
        assert_eq!(
            Namespace::Timing.route(TimingRegister::ParamPeriod.offset()),
            Some((RegisterPort::System, 0x2010))
        );
        assert_eq!(
            Namespace::System.route(0x0010),
            Some((RegisterPort::System, 0x0010))
        );
        assert_eq!(Namespace::Timing.route(0xE000), None);
    }

    #[test]
    fn test_same_offset_different_namespaces() {
        let sys: RegisterAddress<SystemSpace> = SystemRegister::DphyInitDone.into();
        let cam: RegisterAddress<CameraSpace> = CameraRegister::SensorEnable.into();
        assert_eq!(sys.offset(), cam.offset());
        assert_ne!(sys.namespace(), cam.namespace());
    }

    #[test]
    fn test_register_table_offsets() {
        assert_eq!(SystemRegister::BlackHeight.offset(), 0x000B);
        assert_eq!(CameraRegister::DphyInitDone.offset(), 0x0088);
        assert_eq!(TimingRegister::ParamTrig0Pol.offset(), 0x0022);
        assert_eq!(
            CameraRegister::from_offset(0x0022),
            Some(CameraRegister::AlignPattern)
        );
        assert_eq!(SystemRegister::from_offset(0x0005), None);
    }

    #[test]
    fn test_address_display() {
        let addr = RegisterAddress::<TimingSpace>::new(0x21);
        assert_eq!(addr.to_string(), "timing:0x0021");
        assert_eq!(TimingRegister::ParamTrig0End.to_string(), "paramTrig0End");
    }
}
