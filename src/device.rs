// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A host-side stand-in for a SIMT device.
//!
//! A kernel is a function of `(lane index, output slot)`.  A launch
//! cuts the output buffer into blocks of `block_size` lanes and deals
//! the blocks out round-robin to `partitions` scoped threads, the way
//! a GPU hands thread blocks to its multiprocessors.  Every lane owns
//! exactly one slot; nobody writes anybody else's.
//!
//! A partition may publish a read-only cache before any of its lanes
//! run.  All partitions meet at a barrier after publishing, so no lane
//! anywhere in the launch starts before every cache is in place.

use std::sync::Barrier;

use log::debug;

use crate::errors::FractalError;

/// Lanes per block when nobody says otherwise.
pub const DEFAULT_BLOCK_SIZE: usize = 64;

/// The shape of the device.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DeviceConfig {
    /// Lanes per block.
    pub block_size: usize,
    /// Number of threads blocks are spread over.
    pub partitions: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        DeviceConfig {
            block_size: DEFAULT_BLOCK_SIZE,
            partitions: num_cpus::get(),
        }
    }
}

/// A validated device ready to run kernels.
#[derive(Debug)]
pub struct Device {
    config: DeviceConfig,
}

impl Device {
    /// Zero partitions means there is nothing to run on, which is a
    /// dispatch failure; a zero block size is a configuration error.
    pub fn new(config: DeviceConfig) -> Result<Self, FractalError> {
        if config.block_size == 0 {
            return Err(FractalError::config("block size must be at least 1"));
        }
        if config.partitions == 0 {
            return Err(FractalError::Dispatch(
                "device has no partitions available".to_string(),
            ));
        }
        Ok(Device { config })
    }

    /// A device with the default block size on every available CPU.
    pub fn host() -> Result<Self, FractalError> {
        Device::new(DeviceConfig::default())
    }

    /// The shape this device was built with.
    pub fn config(&self) -> DeviceConfig {
        self.config
    }

    /// Lanes per block.
    pub fn block_size(&self) -> usize {
        self.config.block_size
    }

    /// Run `kernel` once for every slot with no shared state.
    pub fn launch<T, K>(&self, slots: &mut [T], kernel: K) -> Result<(), FractalError>
    where
        T: Send,
        K: Fn(usize, &mut T) + Sync,
    {
        self.launch_shared(slots, || (), |_, index, slot| kernel(index, slot))
    }

    /// Run `kernel` once for every slot.  Each partition calls
    /// `publish` once to build its cache, waits at the barrier, then
    /// runs its lanes against that cache.  A panicking lane fails the
    /// whole launch; whatever was written to `slots` is then garbage.
    pub fn launch_shared<T, S, P, K>(
        &self,
        slots: &mut [T],
        publish: P,
        kernel: K,
    ) -> Result<(), FractalError>
    where
        T: Send,
        P: Fn() -> S + Sync,
        K: Fn(&S, usize, &mut T) + Sync,
    {
        if slots.is_empty() {
            return Ok(());
        }

        let block_size = self.config.block_size;
        let blocks = (slots.len() + block_size - 1) / block_size;
        let partitions = self.config.partitions.min(blocks);

        let mut assignments: Vec<Vec<(usize, &mut [T])>> =
            (0..partitions).map(|_| Vec::new()).collect();
        for (block, lanes) in slots.chunks_mut(block_size).enumerate() {
            assignments[block % partitions].push((block * block_size, lanes));
        }
        debug!(
            "launch: {} lanes in {} blocks over {} partitions",
            blocks * block_size,
            blocks,
            partitions
        );

        let barrier = Barrier::new(partitions);
        let (barrier, publish, kernel) = (&barrier, &publish, &kernel);
        crossbeam::scope(|spawner| {
            for assigned in assignments {
                spawner.spawn(move |_| {
                    let cache = publish();
                    barrier.wait();
                    for (first, lanes) in assigned {
                        for (lane, slot) in lanes.iter_mut().enumerate() {
                            kernel(&cache, first + lane, slot);
                        }
                    }
                });
            }
        })
        .map_err(|_| FractalError::Dispatch("a kernel lane panicked".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn device(block_size: usize, partitions: usize) -> Device {
        Device::new(DeviceConfig {
            block_size,
            partitions,
        })
        .unwrap()
    }

    #[test]
    fn zero_block_size_is_a_configuration_error() {
        let e = Device::new(DeviceConfig {
            block_size: 0,
            partitions: 2,
        })
        .unwrap_err();
        assert!(e.is_configuration());
    }

    #[test]
    fn zero_partitions_is_a_dispatch_failure() {
        match Device::new(DeviceConfig {
            block_size: 8,
            partitions: 0,
        }) {
            Err(FractalError::Dispatch(_)) => (),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn every_slot_is_visited_once_with_its_own_index() {
        for &(block_size, partitions) in &[(1, 1), (3, 2), (64, 4), (7, 16), (1000, 3)] {
            let mut slots = vec![usize::max_value(); 533];
            device(block_size, partitions)
                .launch(&mut slots, |index, slot| *slot = index)
                .unwrap();
            let expected: Vec<usize> = (0..533).collect();
            assert_eq!(slots, expected, "block {} partitions {}", block_size, partitions);
        }
    }

    #[test]
    fn each_partition_publishes_before_lanes_run() {
        let published = AtomicUsize::new(0);
        let mut slots = vec![0usize; 40];
        let d = device(4, 3);
        d.launch_shared(
            &mut slots,
            || {
                published.fetch_add(1, Ordering::SeqCst);
                10usize
            },
            |cache, index, slot| {
                // Past the barrier, every partition has published.
                assert_eq!(published.load(Ordering::SeqCst), 3);
                *slot = cache + index;
            },
        )
        .unwrap();
        assert_eq!(published.load(Ordering::SeqCst), 3);
        assert_eq!(slots[0], 10);
        assert_eq!(slots[39], 49);
    }

    #[test]
    fn empty_launch_does_nothing() {
        let mut slots: Vec<u8> = vec![];
        device(8, 2).launch(&mut slots, |_, _| panic!("no lanes")).unwrap();
    }

    #[test]
    fn panicking_lane_fails_the_launch() {
        let mut slots = vec![0u32; 100];
        let result = device(16, 2).launch(&mut slots, |index, slot| {
            if index == 42 {
                panic!("lane 42 faulted");
            }
            *slot = 1;
        });
        match result {
            Err(FractalError::Dispatch(_)) => (),
            other => panic!("unexpected {:?}", other),
        }
    }
}
