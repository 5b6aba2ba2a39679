//! Capture pipeline: command building, bounds tracking, ordered dispatch,
//! and structure-block persistence

mod bounds;
mod command;
mod queue;
mod save;
mod structure;

pub use bounds::{BoundingBox, BoundsTracker};
pub use command::{
    BlockStates, FillMode, FillOptions, SetMode, SetOptions, fill_command, namespaced,
    set_block_command,
};
pub use queue::{CommandHandle, CommandQueue, Transport};
pub use save::{SAVE_PACKET_BASE_LEN, encode_save_instruction, packed_position};
pub use structure::{StructureBlockPlacer, StructureSaveRequest};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use serde::Serialize;

use crate::error::{CaptureError, Result};

/// Integer block coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    /// Floor float coordinates into a block position. World positions from
    /// outside the pipeline may be fractional but never non-finite.
    pub fn floored(x: f64, y: f64, z: f64) -> Result<Self> {
        for value in [x, y, z] {
            if !value.is_finite() {
                return Err(CaptureError::InvalidCoordinate(value));
            }
        }
        Ok(Self::new(
            x.floor() as i32,
            y.floor() as i32,
            z.floor() as i32,
        ))
    }

    pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Per-axis extent of a bounding box, always derived as `max - min + 1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: i32,
    pub height: i32,
    pub depth: i32,
}

/// Drives one build-and-capture run against the server.
///
/// Owns the command queue and the bounds tracker for the session; build
/// operations go out through the queue and fold their coordinates into the
/// tracker once dispatched.
pub struct CaptureSession<T: Transport> {
    queue: CommandQueue<T>,
    tracker: BoundsTracker,
    username: String,
    verbose: bool,
}

impl<T: Transport> CaptureSession<T> {
    pub fn new(transport: Arc<T>, command_delay: Duration, username: impl Into<String>) -> Self {
        Self {
            queue: CommandQueue::new(transport, command_delay),
            tracker: BoundsTracker::new(),
            username: username.into(),
            verbose: false,
        }
    }

    pub fn set_verbose(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.tracker.bounding_box()
    }

    pub fn dimensions(&self) -> Option<Dimensions> {
        self.tracker.dimensions()
    }

    pub fn commands_sent(&self) -> usize {
        self.queue.submitted()
    }

    /// Fill the region between two corners. All corner combinations fold
    /// into the tracked bounds once the command has been dispatched; interior
    /// blocks are not tracked individually.
    pub async fn fill(
        &mut self,
        corner1: [f64; 3],
        corner2: [f64; 3],
        block: &str,
        options: &FillOptions,
    ) -> Result<()> {
        let c1 = BlockPos::floored(corner1[0], corner1[1], corner1[2])?;
        let c2 = BlockPos::floored(corner2[0], corner2[1], corner2[2])?;
        let cmd = command::fill_command(c1, c2, block, options);
        self.echo(&cmd);
        self.queue.submit(cmd).dispatched().await?;
        for x in [c1.x, c2.x] {
            for y in [c1.y, c2.y] {
                for z in [c1.z, c2.z] {
                    self.tracker.record(BlockPos::new(x, y, z));
                }
            }
        }
        Ok(())
    }

    /// Place a single block
    pub async fn set_block(
        &mut self,
        pos: [f64; 3],
        block: &str,
        options: &SetOptions,
    ) -> Result<()> {
        let pos = BlockPos::floored(pos[0], pos[1], pos[2])?;
        let cmd = command::set_block_command(pos, block, options);
        self.echo(&cmd);
        self.queue.submit(cmd).dispatched().await?;
        self.tracker.record(pos);
        Ok(())
    }

    /// Place and configure the structure block over everything recorded so
    /// far, then instruct the server to persist the region under `name`.
    pub async fn persist(&mut self, name: &str) -> Result<StructureSaveRequest> {
        let placer = StructureBlockPlacer::new(&self.queue, &self.username);
        let request = placer.place_and_configure(&mut self.tracker, name).await?;
        save::dispatch_save(self.queue.transport().as_ref(), &request).await?;
        Ok(request)
    }

    fn echo(&self, command: &str) {
        if self.verbose {
            println!("    {} {}", "→".blue(), command.dimmed());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::queue::testing::RecordingTransport;
    use super::*;

    #[test]
    fn floored_rejects_non_finite_coordinates() {
        assert!(BlockPos::floored(1.9, -2.1, 3.0).is_ok());
        assert_eq!(
            BlockPos::floored(1.9, -2.1, 3.0).unwrap(),
            BlockPos::new(1, -3, 3)
        );
        assert!(matches!(
            BlockPos::floored(f64::NAN, 0.0, 0.0).unwrap_err(),
            CaptureError::InvalidCoordinate(_)
        ));
        assert!(BlockPos::floored(0.0, f64::INFINITY, 0.0).is_err());
    }

    #[tokio::test]
    async fn invalid_coordinates_never_reach_the_queue() {
        let transport = Arc::new(RecordingTransport::new());
        let mut session =
            CaptureSession::new(transport.clone(), Duration::from_millis(1), "builder");

        let err = session
            .fill(
                [f64::NAN, 0.0, 0.0],
                [1.0, 1.0, 1.0],
                "stone",
                &FillOptions::default(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CaptureError::InvalidCoordinate(_)));
        assert!(transport.commands().is_empty());
        assert_eq!(session.commands_sent(), 0);
    }

    #[tokio::test]
    async fn rejected_mode_strings_never_become_commands() {
        let transport = Arc::new(RecordingTransport::new());
        let session = CaptureSession::new(transport.clone(), Duration::from_millis(1), "builder");

        assert!("melt".parse::<FillMode>().is_err());
        // outline is a fill mode, not a placement mode
        assert!("outline".parse::<SetMode>().is_err());
        assert!(transport.commands().is_empty());
        assert_eq!(session.commands_sent(), 0);
    }

    #[tokio::test]
    async fn builds_and_captures_end_to_end() {
        let transport = Arc::new(RecordingTransport::new());
        let mut session =
            CaptureSession::new(transport.clone(), Duration::from_millis(1), "builder");

        session
            .fill(
                [0.0, 0.0, 0.0],
                [5.0, 3.0, 5.0],
                "stone",
                &FillOptions::default(),
            )
            .await
            .unwrap();

        let bounds = session.bounding_box().unwrap();
        assert_eq!(bounds.min, BlockPos::new(0, 0, 0));
        assert_eq!(bounds.max, BlockPos::new(5, 3, 5));
        assert_eq!(
            session.dimensions(),
            Some(Dimensions {
                width: 6,
                height: 4,
                depth: 6
            })
        );

        let request = session.persist("hut").await.unwrap();
        assert_eq!(request.anchor_pos, BlockPos::new(-2, 0, -2));
        assert_eq!(request.offset, BlockPos::new(2, 0, 2));

        // build fill + clear fill + setblock + data merge + tp
        let commands = transport.commands();
        assert_eq!(commands.len(), 5);
        assert_eq!(commands[0], "fill 0 0 0 5 3 5 minecraft:stone");

        // exactly one raw packet, sized for the namespaced name
        let raw = transport.raw.lock();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].len(), SAVE_PACKET_BASE_LEN + "minecraft:hut".len());
        assert_eq!(raw[0][0], 0x31);
    }
}
