//! Filesystem and swap operations.

use crate::remote::{CommandRunner, RemoteCommand};

use super::{Abort, ActionDispatcher, Outcome, ProvisionError, aborted, skipped};

impl<R: CommandRunner> ActionDispatcher<'_, R> {
    /// Mounts `device` on `mountpoint` unless the device is already mounted.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Remote`] when probing or mounting fails.
    pub fn mount(&self, device: &str, mountpoint: &str) -> Result<Outcome, ProvisionError> {
        if self.prober.is_mounted(device)? {
            return Ok(skipped("mount", device, "already mounted"));
        }
        self.host.run(
            &RemoteCommand::new("mount")
                .args([device, mountpoint])
                .as_superuser(),
        )?;
        Ok(Outcome::Applied)
    }

    /// Enables swap on `device` unless it is already active.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::Remote`] when probing or `swapon` fails.
    pub fn activate_swap(&self, device: &str) -> Result<Outcome, ProvisionError> {
        if self.prober.is_mounted(device)? {
            return Ok(skipped("activate_swap", device, "already active"));
        }
        self.host
            .run(&RemoteCommand::new("swapon").arg(device).as_superuser())?;
        Ok(Outcome::Applied)
    }

    /// Creates an `fstype` filesystem on `device` with `mkfs.<fstype>`.
    ///
    /// # Errors
    ///
    /// Returns [`Abort::DeviceMounted`] when the device is in use, and
    /// [`ProvisionError::Remote`] when probing or formatting fails.
    pub fn format_filesystem(&self, device: &str, fstype: &str) -> Result<Outcome, ProvisionError> {
        if self.prober.is_mounted(device)? {
            return Err(aborted(
                "format_filesystem",
                Abort::DeviceMounted {
                    device: device.to_owned(),
                },
            ));
        }
        self.host.run(
            &RemoteCommand::new(format!("mkfs.{fstype}"))
                .arg(device)
                .as_superuser(),
        )?;
        Ok(Outcome::Applied)
    }

    /// Initialises `device` as swap space.
    ///
    /// # Errors
    ///
    /// Returns [`Abort::SwapMounted`] when the device is in use, and
    /// [`ProvisionError::Remote`] when probing or `mkswap` fails.
    pub fn format_swap(&self, device: &str) -> Result<Outcome, ProvisionError> {
        if self.prober.is_mounted(device)? {
            return Err(aborted(
                "format_swap",
                Abort::SwapMounted {
                    device: device.to_owned(),
                },
            ));
        }
        self.host
            .run(&RemoteCommand::new("mkswap").arg(device).as_superuser())?;
        Ok(Outcome::Applied)
    }
}
