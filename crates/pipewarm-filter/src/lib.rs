//! Pure feature/extension-chain negotiation: masking the driver's
//! supported capability chain against an application's request, resolving
//! a known conflict, and applying two launcher workarounds. No I/O, no
//! handles, no state outside its arguments and return value.

mod chain;
mod filter;

pub use chain::{
    ChainEntry, ChainEntryKind, FeatureChain, Features10, FragmentDensityMapBits,
    FragmentShadingRateBits, Robustness2Bits, ShadingRateImageBits,
};
pub use filter::{filter_features, FilteredFeatures};
