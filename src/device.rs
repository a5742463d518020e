//! Best-effort detection of a GPU to reconstruct on

use std::process::Command;

use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Device { #[default] Cpu, Gpu }

/// Ask `nvidia-smi` whether an Nvidia GPU can be reached. Any failure (no
/// such command, no GPU, driver error) means "use the CPU".
pub fn gpu_available() -> bool {
    responds(Command::new("nvidia-smi"))
}

fn responds(mut command: Command) -> bool {
    match command.output() {
        Ok(output) if output.status.success() => {
            log::info!("Nvidia GPU detected, will use to reconstruct!");
            true
        },
        Ok(output) => {
            log::info!("No Nvidia GPU in system ({}), will use CPU", output.status);
            false
        },
        Err(e) => {
            log::info!("No Nvidia GPU in system ({e}), will use CPU");
            false
        },
    }
}

impl Device {

    /// The device that will actually run the reconstruction. A GPU request
    /// checks for one; either way it is served by the CPU, as only CPU
    /// backends are built into this crate.
    pub fn resolve(self) -> Device {
        match self {
            Device::Cpu => Device::Cpu,
            Device::Gpu => Self::fall_back(Device::detect()),
        }
    }

    fn fall_back(detected: Device) -> Device {
        match detected {
            Device::Gpu => log::warn!("GPU present, but no GPU reconstruction backend is built in: running on the CPU"),
            Device::Cpu => log::warn!("GPU requested but not available: running on the CPU"),
        }
        Device::Cpu
    }

    /// `Gpu` if a GPU answers `nvidia-smi`, `Cpu` otherwise
    pub fn detect() -> Device {
        if gpu_available() { Device::Gpu } else { Device::Cpu }
    }
}
