//! Drives atlas placement for every unresolved channel. Inherently
//! sequential: first-fit results depend on processing order.

use log::info;
use lumel_atlas::{AtlasPacker, PackerConfig, Stamp};

use crate::config::BakeConfig;
use crate::lightmap::{ChannelState, RawLightmap};

/// Places every channel that still needs storage and returns the packer
/// with its finished page set.
pub fn pack_lightmaps(lightmaps: &mut [RawLightmap], cfg: &BakeConfig) -> AtlasPacker {
    let mut packer = AtlasPacker::new(PackerConfig {
        width: cfg.page_width,
        height: cfg.page_height,
        fast: cfg.fast_allocate,
        search_block: cfg.search_block_size,
        external: cfg.external,
    });

    for lm in lightmaps.iter_mut() {
        let mask = lm.stamp_mask();
        let anchor_slot0 = lm.styles.iter().next();
        let mut anchor = None;
        for slot in lm.styles.iter() {
            let shader = lm.shader.0;
            let ch = &lm.channels[slot];
            if ch.twin.is_some() || ch.state != ChannelState::Unplaced {
                continue;
            }
            let stamp = Stamp {
                w: lm.w,
                h: lm.h,
                solid: ch.solid,
                mask: &mask,
            };
            // Styled channels chase the style-0 spot for stage reuse.
            let use_anchor = Some(slot) != anchor_slot0;
            let placement = packer.place(&stamp, shader, if use_anchor { anchor } else { None });
            let ch = &mut lm.channels[slot];
            ch.placement = Some(placement);
            ch.state = ChannelState::Placed;
            if Some(slot) == anchor_slot0 {
                anchor = Some(placement);
            }
        }
    }

    let total: usize = packer.pages.iter().map(|p| p.width * p.height).sum();
    let free: usize = packer.pages.iter().map(|p| p.free).sum();
    if total > 0 {
        info!(
            "packed into {} pages, {:.1}% used",
            packer.pages.len(),
            (total - free) as f32 * 100.0 / total as f32
        );
    }
    packer
}
