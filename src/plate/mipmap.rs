//! Post-order pyramid construction.
//!
//! A parent is only definable once its children exist, so the walk visits
//! children before composing their parent. It uses an explicit stack instead
//! of recursion. Coordinates that are already valid are skipped, which makes
//! a repeated run a no-op. Coordinates that were never allocated have no
//! ingested descendants and are skipped too.

use image::RgbaImage;
use tracing::debug;

use super::store::{PlateCore, TileRead};
use crate::error::PlateError;
use crate::index::TileLookup;
use crate::tile::{downsample_children, TileCoordinate};

/// Outcome of a mipmap run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MipmapReport {
    /// Tiles generated and written during this run
    pub generated: usize,
}

enum Step {
    Visit(TileCoordinate),
    Compose(TileCoordinate),
}

/// Generate every pending tile in the subtree rooted at `start`.
pub(crate) async fn generate(
    core: &PlateCore,
    start: TileCoordinate,
) -> Result<MipmapReport, PlateError> {
    let max_depth = core.index().max_depth().await;
    let block_size = core.index().default_block_size();

    let mut report = MipmapReport::default();
    let mut stack = vec![Step::Visit(start)];

    while let Some(step) = stack.pop() {
        match step {
            Step::Visit(coord) => match core.index().lookup(coord).await {
                TileLookup::NotAllocated => {}
                TileLookup::Allocated(record) if record.valid => {}
                TileLookup::Allocated(_) => {
                    // No committed tile lies below the deepest level
                    if coord.level >= max_depth {
                        continue;
                    }
                    stack.push(Step::Compose(coord));
                    for child in coord.children().into_iter().rev() {
                        stack.push(Step::Visit(child));
                    }
                }
            },
            Step::Compose(coord) => {
                let children = read_children(core, coord).await?;
                if children.iter().all(Option::is_none) {
                    debug!(coord = %coord, "No children available, skipping");
                    continue;
                }

                let present = children.iter().filter(|c| c.is_some()).count();
                let parent = downsample_children(&children, block_size);
                core.write(coord, &parent).await?;
                report.generated += 1;

                debug!(
                    coord = %coord,
                    children = present,
                    width = parent.width(),
                    height = parent.height(),
                    "Generated mipmap tile"
                );
            }
        }
    }

    Ok(report)
}

/// Read the four children of `coord`. Missing or pending children are `None`.
async fn read_children(
    core: &PlateCore,
    coord: TileCoordinate,
) -> Result<[Option<RgbaImage>; 4], PlateError> {
    let mut children: [Option<RgbaImage>; 4] = Default::default();

    for (slot, child) in children.iter_mut().zip(coord.children()) {
        match core.read(child).await {
            Ok(TileRead { image, .. }) => *slot = image,
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
    }

    Ok(children)
}
