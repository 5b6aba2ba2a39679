//! Structure block placement and configuration

use serde::Serialize;

use crate::error::{CaptureError, Result};

use super::bounds::BoundsTracker;
use super::command::{self, FillOptions};
use super::queue::{CommandQueue, Transport};
use super::{BlockPos, Dimensions};

/// Horizontal clearance between the structure block and the bounding box
const ANCHOR_CLEARANCE: i32 = 2;
/// Extra step from the structure block to where the bot stands
const STAND_OFF_DISTANCE: i32 = 1;
/// Half-extent of the air pocket cleared around the structure block
const CLEAR_RADIUS: i32 = 1;

const STRUCTURE_BLOCK: &str = "structure_block";

/// Everything the save packet needs, produced once per capture
#[derive(Debug, Clone, Serialize)]
pub struct StructureSaveRequest {
    pub anchor_pos: BlockPos,
    /// Position of the bounding box minimum relative to the anchor
    pub offset: BlockPos,
    pub dimensions: Dimensions,
    pub name: String,
}

/// Places the structure block next to the tracked bounds and configures it
/// for a save, one awaited command at a time.
pub struct StructureBlockPlacer<'a, T: Transport> {
    queue: &'a CommandQueue<T>,
    username: &'a str,
}

impl<'a, T: Transport> StructureBlockPlacer<'a, T> {
    pub fn new(queue: &'a CommandQueue<T>, username: &'a str) -> Self {
        Self { queue, username }
    }

    /// Clear space beside the captured region, place the structure block,
    /// merge its save configuration, and move the bot out of the way.
    ///
    /// Fails with [`CaptureError::NoGeometryCaptured`] before issuing any
    /// command when nothing has been recorded yet.
    pub async fn place_and_configure(
        &self,
        tracker: &mut BoundsTracker,
        name: &str,
    ) -> Result<StructureSaveRequest> {
        let bounds = tracker.bounding_box().ok_or(CaptureError::NoGeometryCaptured)?;
        let dimensions = bounds.dimensions();

        let anchor = BlockPos::new(
            bounds.min.x - ANCHOR_CLEARANCE,
            bounds.min.y,
            bounds.min.z - ANCHOR_CLEARANCE,
        );
        let stand_off = BlockPos::new(
            anchor.x - STAND_OFF_DISTANCE,
            anchor.y,
            anchor.z - STAND_OFF_DISTANCE,
        );
        // Derived, not hard-coded: the clearance rule may change
        let offset = BlockPos::new(
            bounds.min.x - anchor.x,
            bounds.min.y - anchor.y,
            bounds.min.z - anchor.z,
        );

        tracing::info!(anchor = %anchor, name, "placing structure block");

        // Clear an air pocket around the anchor; the fill corners fold into
        // the tracker like any other fill, after the snapshot above
        let clear_min = anchor.offset(-CLEAR_RADIUS, -CLEAR_RADIUS, -CLEAR_RADIUS);
        let clear_max = anchor.offset(CLEAR_RADIUS, CLEAR_RADIUS, CLEAR_RADIUS);
        let clear = command::fill_command(clear_min, clear_max, "air", &FillOptions::default());
        self.queue.submit(clear).dispatched().await?;
        for x in [clear_min.x, clear_max.x] {
            for y in [clear_min.y, clear_max.y] {
                for z in [clear_min.z, clear_max.z] {
                    tracker.record(BlockPos::new(x, y, z));
                }
            }
        }

        let place = format!(
            "setblock {} {} {} {}",
            anchor.x, anchor.y, anchor.z, STRUCTURE_BLOCK
        );
        self.queue.submit(place).dispatched().await?;

        let merge = format!(
            "data merge block {} {} {} {}",
            anchor.x,
            anchor.y,
            anchor.z,
            configure_payload(name, offset, dimensions, self.username)
        );
        self.queue.submit(merge).dispatched().await?;

        let teleport = format!(
            "tp {} {} {} {} -90 0",
            self.username, stand_off.x, stand_off.y, stand_off.z
        );
        self.queue.submit(teleport).dispatched().await?;

        Ok(StructureSaveRequest {
            anchor_pos: anchor,
            offset,
            dimensions,
            name: name.to_string(),
        })
    }
}

/// SNBT merged onto the structure block entity
fn configure_payload(
    name: &str,
    offset: BlockPos,
    dimensions: Dimensions,
    author: &str,
) -> String {
    format!(
        "{{mode:\"SAVE\",name:\"{name}\",posX:{},posY:{},posZ:{},sizeX:{},sizeY:{},sizeZ:{},\
         rotation:\"NONE\",mirror:\"NONE\",ignoreEntities:0,powered:0,seed:0,\
         author:\"{author}\",metadata:\"\",showair:0,showboundingbox:1}}",
        offset.x, offset.y, offset.z, dimensions.width, dimensions.height, dimensions.depth
    )
}
