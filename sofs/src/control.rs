//! # Session
//!
//! [`Sofs`] owns everything a mounted volume needs in memory: the staging
//! slots and the caller's configuration. Each operation takes `&mut self`,
//! so only one of them runs at a time.

use alloc::sync::Arc;

use block_dev::BlockDevice;

use crate::consist;
use crate::layout::{DataCluster, MountStatus, OnDisk, SuperBlock};
use crate::staging::Staging;
use crate::{Config, Credentials, Inconsistency, Result};

pub struct Sofs {
    pub(crate) staging: Staging,
    pub(crate) config: Config,
}

impl Sofs {
    /// Opens a formatted volume and flags it as mounted.
    pub fn mount(dev: Arc<dyn BlockDevice>, config: Config) -> Result<Self> {
        let mut fs = Self {
            staging: Staging::new(dev),
            config,
        };

        let sb = fs.staging.sb()?;
        if !sb.is_valid_magic() {
            return Err(Inconsistency::BadMagic.into());
        }
        consist::check_super_block(&sb)?;
        consist::check_data_zone(&sb)?;
        if sb.mount_status() == MountStatus::Dirty {
            log::warn!("volume {:?} was not properly unmounted", sb.name());
        }

        fs.staging.super_block_mut()?.set_mount_status(MountStatus::Dirty);
        fs.staging.store_super_block()?;
        log::debug!(
            "mounted {:?}: {} inodes ({} free), {} clusters ({} free)",
            sb.name(),
            sb.itotal,
            sb.ifree,
            sb.dzone_total,
            sb.dzone_free
        );

        Ok(fs)
    }

    /// Flags the volume as properly unmounted.
    pub fn unmount(mut self) -> Result<()> {
        self.staging.load_super_block()?;
        self.staging.super_block_mut()?.set_mount_status(MountStatus::Clean);
        self.staging.store_super_block()
    }

    #[inline]
    pub fn credentials(&self) -> Credentials {
        self.config.credentials
    }

    /// Switches the caller identity for the following operations.
    pub fn set_credentials(&mut self, credentials: Credentials) {
        self.config.credentials = credentials;
    }

    /// A copy of the current superblock.
    pub fn super_block(&mut self) -> Result<SuperBlock> {
        self.staging.sb()
    }

    #[inline]
    pub(crate) fn now(&self) -> u32 {
        self.config.now()
    }

    /// Reads data cluster `c` straight from the device.
    pub(crate) fn read_cluster(&mut self, c: u32, buf: &mut DataCluster) -> Result<()> {
        let block = self.staging.cluster_block(c)?;
        Ok(self.staging.device().read_blocks(block, buf.as_bytes_mut())?)
    }

    /// Writes data cluster `c` straight to the device.
    pub(crate) fn write_cluster(&mut self, c: u32, buf: &DataCluster) -> Result<()> {
        let block = self.staging.cluster_block(c)?;
        Ok(self.staging.device().write_blocks(block, buf.as_bytes())?)
    }
}
