//! Benchmarks the pure feature/extension-chain filter in isolation, since
//! it runs once per `device_create` call but its cost is easy to reason
//! about independent of any driver.

use criterion::{criterion_group, criterion_main, Criterion};
use pipewarm_filter::{
    filter_features, ChainEntry, FeatureChain, Features10, FragmentDensityMapBits,
    FragmentShadingRateBits, Robustness2Bits, ShadingRateImageBits,
};

fn full_chain() -> FeatureChain {
    FeatureChain {
        core: Features10 { robust_buffer_access: true },
        entries: vec![
            ChainEntry::FragmentShadingRate(FragmentShadingRateBits {
                pipeline_fragment_shading_rate: true,
                primitive_fragment_shading_rate: true,
                attachment_fragment_shading_rate: true,
            }),
            ChainEntry::ShadingRateImage(ShadingRateImageBits {
                shading_rate_image: true,
                shading_rate_coarse_sample_order: true,
            }),
            ChainEntry::FragmentDensityMap(FragmentDensityMapBits { fragment_density_map: true }),
            ChainEntry::Robustness2(Robustness2Bits {
                robust_buffer_access2: true,
                robust_image_access2: true,
                null_descriptor: true,
            }),
        ],
    }
}

fn bench_filter_features(c: &mut Criterion) {
    let supported = full_chain();
    let requested = full_chain();
    c.bench_function("filter_features_full_chain", |b| {
        b.iter(|| {
            let filtered = filter_features(&supported, &requested, "dxvk");
            criterion::black_box(filtered);
        });
    });
}

criterion_group!(benches, bench_filter_features);
criterion_main!(benches);
