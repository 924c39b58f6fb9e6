/// The one core-1.0 boolean this filter cares about. Unlike the chain
/// entries below it is never unlinked — it lives directly on the features2
/// struct, not behind a `pNext`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Features10 {
    pub robust_buffer_access: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainEntryKind {
    FragmentShadingRate,
    ShadingRateImage,
    FragmentDensityMap,
    Robustness2,
}

impl ChainEntryKind {
    pub const ALL: [ChainEntryKind; 4] = [
        ChainEntryKind::FragmentShadingRate,
        ChainEntryKind::ShadingRateImage,
        ChainEntryKind::FragmentDensityMap,
        ChainEntryKind::Robustness2,
    ];

    pub fn extension_name(self) -> &'static str {
        match self {
            ChainEntryKind::FragmentShadingRate => "VK_KHR_fragment_shading_rate",
            ChainEntryKind::ShadingRateImage => "VK_NV_shading_rate_image",
            ChainEntryKind::FragmentDensityMap => "VK_EXT_fragment_density_map",
            ChainEntryKind::Robustness2 => "VK_EXT_robustness2",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FragmentShadingRateBits {
    pub pipeline_fragment_shading_rate: bool,
    pub primitive_fragment_shading_rate: bool,
    pub attachment_fragment_shading_rate: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShadingRateImageBits {
    pub shading_rate_image: bool,
    pub shading_rate_coarse_sample_order: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FragmentDensityMapBits {
    pub fragment_density_map: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Robustness2Bits {
    pub robust_buffer_access2: bool,
    pub robust_image_access2: bool,
    pub null_descriptor: bool,
}

/// One `pNext` chain node. Each variant carries only boolean capability
/// bits; a node with every bit false is, per spec.md §4.7, eligible to be
/// unlinked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainEntry {
    FragmentShadingRate(FragmentShadingRateBits),
    ShadingRateImage(ShadingRateImageBits),
    FragmentDensityMap(FragmentDensityMapBits),
    Robustness2(Robustness2Bits),
}

impl ChainEntry {
    pub fn kind(&self) -> ChainEntryKind {
        match self {
            ChainEntry::FragmentShadingRate(_) => ChainEntryKind::FragmentShadingRate,
            ChainEntry::ShadingRateImage(_) => ChainEntryKind::ShadingRateImage,
            ChainEntry::FragmentDensityMap(_) => ChainEntryKind::FragmentDensityMap,
            ChainEntry::Robustness2(_) => ChainEntryKind::Robustness2,
        }
    }

    pub fn zeroed(kind: ChainEntryKind) -> ChainEntry {
        match kind {
            ChainEntryKind::FragmentShadingRate => {
                ChainEntry::FragmentShadingRate(Default::default())
            }
            ChainEntryKind::ShadingRateImage => ChainEntry::ShadingRateImage(Default::default()),
            ChainEntryKind::FragmentDensityMap => {
                ChainEntry::FragmentDensityMap(Default::default())
            }
            ChainEntryKind::Robustness2 => ChainEntry::Robustness2(Default::default()),
        }
    }

    pub fn any_bit_set(&self) -> bool {
        match self {
            ChainEntry::FragmentShadingRate(b) => {
                b.pipeline_fragment_shading_rate
                    || b.primitive_fragment_shading_rate
                    || b.attachment_fragment_shading_rate
            }
            ChainEntry::ShadingRateImage(b) => {
                b.shading_rate_image || b.shading_rate_coarse_sample_order
            }
            ChainEntry::FragmentDensityMap(b) => b.fragment_density_map,
            ChainEntry::Robustness2(b) => {
                b.robust_buffer_access2 || b.robust_image_access2 || b.null_descriptor
            }
        }
    }

    /// Bit-wise AND of two entries of the same kind.
    ///
    /// Panics if `self` and `other` are different kinds; callers only ever
    /// mask entries already matched by [`ChainEntry::kind`].
    pub fn masked(&self, other: &ChainEntry) -> ChainEntry {
        match (self, other) {
            (ChainEntry::FragmentShadingRate(a), ChainEntry::FragmentShadingRate(b)) => {
                ChainEntry::FragmentShadingRate(FragmentShadingRateBits {
                    pipeline_fragment_shading_rate: a.pipeline_fragment_shading_rate
                        && b.pipeline_fragment_shading_rate,
                    primitive_fragment_shading_rate: a.primitive_fragment_shading_rate
                        && b.primitive_fragment_shading_rate,
                    attachment_fragment_shading_rate: a.attachment_fragment_shading_rate
                        && b.attachment_fragment_shading_rate,
                })
            }
            (ChainEntry::ShadingRateImage(a), ChainEntry::ShadingRateImage(b)) => {
                ChainEntry::ShadingRateImage(ShadingRateImageBits {
                    shading_rate_image: a.shading_rate_image && b.shading_rate_image,
                    shading_rate_coarse_sample_order: a.shading_rate_coarse_sample_order
                        && b.shading_rate_coarse_sample_order,
                })
            }
            (ChainEntry::FragmentDensityMap(a), ChainEntry::FragmentDensityMap(b)) => {
                ChainEntry::FragmentDensityMap(FragmentDensityMapBits {
                    fragment_density_map: a.fragment_density_map && b.fragment_density_map,
                })
            }
            (ChainEntry::Robustness2(a), ChainEntry::Robustness2(b)) => {
                ChainEntry::Robustness2(Robustness2Bits {
                    robust_buffer_access2: a.robust_buffer_access2 && b.robust_buffer_access2,
                    robust_image_access2: a.robust_image_access2 && b.robust_image_access2,
                    null_descriptor: a.null_descriptor && b.null_descriptor,
                })
            }
            _ => panic!("masked() called on mismatched chain entry kinds"),
        }
    }
}

/// A features2 struct: the core-1.0 bit plus a `pNext` chain of known
/// extension entries.
#[derive(Debug, Clone, Default)]
pub struct FeatureChain {
    pub core: Features10,
    pub entries: Vec<ChainEntry>,
}

impl FeatureChain {
    pub fn find(&self, kind: ChainEntryKind) -> Option<&ChainEntry> {
        self.entries.iter().find(|entry| entry.kind() == kind)
    }
}
