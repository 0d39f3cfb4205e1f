//! GPU frame timing via timestamp queries.
//!
//! One pair of timestamps brackets the frame's compute passes. The
//! async readback is guarded by an in-flight flag: while one readback
//! is pending, later frames skip theirs instead of queuing overlapping
//! buffer maps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use wgpu::{Device, Queue};

pub struct FrameTimer {
    query_set: Option<wgpu::QuerySet>,
    resolve_buffer: wgpu::Buffer,
    readback_buffer: Arc<wgpu::Buffer>,
    in_flight: Arc<AtomicBool>,
    last_ms: Arc<Mutex<Option<f32>>>,
    timestamp_period: f32,
}

impl FrameTimer {
    pub fn new(device: &Device, queue: &Queue) -> Self {
        let supported = device.features().contains(wgpu::Features::TIMESTAMP_QUERY);
        let query_set = supported.then(|| {
            device.create_query_set(&wgpu::QuerySetDescriptor {
                label: Some("Frame Timestamp Query Set"),
                ty: wgpu::QueryType::Timestamp,
                count: 2,
            })
        });
        if !supported {
            log::info!("timestamp queries unsupported, frame timing disabled");
        }
        let resolve_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Timestamp Resolve Buffer"),
            size: 16,
            usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback_buffer = Arc::new(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Timestamp Readback Buffer"),
            size: 16,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        }));
        Self {
            query_set,
            resolve_buffer,
            readback_buffer,
            in_flight: Arc::new(AtomicBool::new(false)),
            last_ms: Arc::new(Mutex::new(None)),
            timestamp_period: queue.get_timestamp_period(),
        }
    }

    /// Timestamp writes for the first compute pass of the frame.
    pub fn begin_writes(&self) -> Option<wgpu::ComputePassTimestampWrites<'_>> {
        self.query_set
            .as_ref()
            .map(|qs| wgpu::ComputePassTimestampWrites {
                query_set: qs,
                beginning_of_pass_write_index: Some(0),
                end_of_pass_write_index: None,
            })
    }

    /// Timestamp writes for the last compute pass of the frame.
    pub fn end_writes(&self) -> Option<wgpu::ComputePassTimestampWrites<'_>> {
        self.query_set
            .as_ref()
            .map(|qs| wgpu::ComputePassTimestampWrites {
                query_set: qs,
                beginning_of_pass_write_index: None,
                end_of_pass_write_index: Some(1),
            })
    }

    /// Resolve the queries into the readback buffer. Skipped while a
    /// previous readback is still mapped.
    pub fn resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        let Some(query_set) = &self.query_set else {
            return;
        };
        if self.in_flight.load(Ordering::Acquire) {
            return;
        }
        encoder.resolve_query_set(query_set, 0..2, &self.resolve_buffer, 0);
        encoder.copy_buffer_to_buffer(&self.resolve_buffer, 0, &self.readback_buffer, 0, 16);
    }

    /// Kick off the async map after the frame's submit. Dropped when a
    /// readback is already pending.
    pub fn start_readback(&self) {
        if self.query_set.is_none() {
            return;
        }
        if self.in_flight.swap(true, Ordering::AcqRel) {
            return;
        }
        let buffer = self.readback_buffer.clone();
        let in_flight = self.in_flight.clone();
        let last_ms = self.last_ms.clone();
        let period = self.timestamp_period;
        self.readback_buffer
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                if result.is_ok() {
                    let stamps: [u64; 2] = {
                        let data = buffer.slice(..).get_mapped_range();
                        [
                            u64::from_le_bytes(data[0..8].try_into().unwrap_or_default()),
                            u64::from_le_bytes(data[8..16].try_into().unwrap_or_default()),
                        ]
                    };
                    buffer.unmap();
                    let ns = stamps[1].saturating_sub(stamps[0]) as f32 * period;
                    if let Ok(mut slot) = last_ms.lock() {
                        *slot = Some(ns / 1_000_000.0);
                    }
                }
                in_flight.store(false, Ordering::Release);
            });
    }

    /// Latest completed GPU frame time in milliseconds. The caller
    /// must be polling the device for map callbacks to fire.
    pub fn last_frame_ms(&self) -> Option<f32> {
        self.last_ms.lock().ok().and_then(|slot| *slot)
    }
}
