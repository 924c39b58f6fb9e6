use crate::chain::{ChainEntry, ChainEntryKind, FeatureChain, Features10, FragmentShadingRateBits, Robustness2Bits};

/// The result of negotiating the driver's supported chain against the
/// application's requested one: what to actually enable on `device_create`.
#[derive(Debug, Clone, Default)]
pub struct FilteredFeatures {
    pub core: Features10,
    pub entries: Vec<ChainEntry>,
    pub enabled_extensions: Vec<String>,
}

fn push_extension_once(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|existing| existing == name) {
        list.push(name.to_string());
    }
}

/// A bit-exact reproduction of capture-time feature negotiation
/// (spec.md §4.7). Pure: same inputs always produce the same output, and
/// nothing outside the returned value is touched.
pub fn filter_features(
    supported: &FeatureChain,
    requested: &FeatureChain,
    application_engine_name: &str,
) -> FilteredFeatures {
    let core = Features10 {
        robust_buffer_access: supported.core.robust_buffer_access
            && requested.core.robust_buffer_access,
    };

    // Step 1: mask every known chain-entry type that the driver supports.
    // A kind `supported` doesn't report at all never gets an extension name
    // in the first place, not even one for step 3 to later strip.
    let mut entries: Vec<ChainEntry> = Vec::new();
    let mut enabled_extensions: Vec<String> = Vec::new();
    for kind in ChainEntryKind::ALL {
        let Some(supported_entry) = supported.find(kind) else {
            continue;
        };
        let masked = match requested.find(kind) {
            Some(requested_entry) => supported_entry.masked(requested_entry),
            None => ChainEntry::zeroed(kind),
        };
        enabled_extensions.push(kind.extension_name().to_string());
        entries.push(masked);
    }

    // Step 2: fragment-shading-rate conflicts with shading-rate-image and
    // fragment-density-map.
    let shading_rate_active = entries
        .iter()
        .any(|entry| entry.kind() == ChainEntryKind::FragmentShadingRate && entry.any_bit_set());
    if shading_rate_active {
        for entry in entries.iter_mut() {
            match entry {
                ChainEntry::ShadingRateImage(bits) => *bits = Default::default(),
                ChainEntry::FragmentDensityMap(bits) => *bits = Default::default(),
                _ => {}
            }
        }
    }

    // Step 3: unlink now-all-zero entries and drop their extension names.
    entries.retain(|entry| {
        let keep = entry.any_bit_set();
        if !keep {
            let name = entry.kind().extension_name();
            enabled_extensions.retain(|existing| existing != name);
        }
        keep
    });

    // Step 4: DXVK/vkd3d workarounds.
    let is_dxvk_or_vkd3d = matches!(application_engine_name, "DXVK" | "vkd3d");
    if is_dxvk_or_vkd3d && entries.iter().all(|e| e.kind() != ChainEntryKind::Robustness2) {
        entries.push(ChainEntry::Robustness2(Robustness2Bits {
            robust_buffer_access2: core.robust_buffer_access,
            ..Default::default()
        }));
        push_extension_once(&mut enabled_extensions, ChainEntryKind::Robustness2.extension_name());
    }
    if application_engine_name == "vkd3d"
        && entries.iter().all(|e| e.kind() != ChainEntryKind::FragmentShadingRate)
    {
        entries.push(ChainEntry::FragmentShadingRate(FragmentShadingRateBits {
            pipeline_fragment_shading_rate: true,
            primitive_fragment_shading_rate: true,
            attachment_fragment_shading_rate: true,
        }));
        push_extension_once(
            &mut enabled_extensions,
            ChainEntryKind::FragmentShadingRate.extension_name(),
        );
    }

    FilteredFeatures {
        core,
        entries,
        enabled_extensions,
    }
}
