use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use passport_witness::certificate::parse_certificate;
use passport_witness::commitment::{generate_commitment, generate_nullifier};
use passport_witness::document::DocumentCategory;
use passport_witness::field::FieldElement;
use passport_witness::hash::pack_bytes_and_poseidon;
use passport_witness::leaves::get_leaf_dsc_tree;
use passport_witness::merkle::MerkleTree;
use passport_witness::metadata::derive_passport_metadata;
use passport_witness::mock::{build_mock_document, MockHashes, MockSigner, SAMPLE_TD3_MRZ};
use passport_witness::poseidon::{custom_hasher, init_crypto, poseidon, poseidon2};

const CSCA_PEM: &[u8] = include_bytes!("../tests/fixtures/csca_rsa2048.pem");
const DSC_PEM: &[u8] = include_bytes!("../tests/fixtures/dsc_p256.pem");
const DSC_KEY: &[u8] = include_bytes!("../tests/fixtures/dsc_p256_key.pem");

fn leaves(count: u64) -> Vec<FieldElement> {
    (0..count).map(|i| FieldElement::from(i + 1)).collect()
}

fn bench_poseidon(c: &mut Criterion) {
    init_crypto();
    c.bench_function("poseidon2", |b| {
        b.iter(|| {
            black_box(poseidon2(
                black_box(FieldElement::from(1u64)),
                black_box(FieldElement::from(2u64)),
            ))
        })
    });

    c.bench_function("poseidon5", |b| {
        let inputs = [1u64, 2, 3, 4, 5].map(FieldElement::from);
        b.iter(|| black_box(poseidon(black_box(inputs))))
    });

    let mut group = c.benchmark_group("custom_hasher");
    for count in [16u64, 35, 64].iter() {
        let inputs = leaves(*count);
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| black_box(custom_hasher(black_box(&inputs)).unwrap()))
        });
    }
    group.finish();

    c.bench_function("pack_bytes_and_poseidon_dg1", |b| {
        let dg1 = vec![0x3cu8; 93];
        b.iter(|| black_box(pack_bytes_and_poseidon(black_box(&dg1)).unwrap()))
    });
}

fn bench_merkle_tree_construction(c: &mut Criterion) {
    init_crypto();
    let mut group = c.benchmark_group("merkle_tree_construction");

    for leaf_count in [16u64, 256, 4096].iter() {
        let leaves = leaves(*leaf_count);
        group.bench_with_input(
            BenchmarkId::from_parameter(leaf_count),
            leaf_count,
            |b, _| b.iter(|| black_box(MerkleTree::new(black_box(leaves.clone())).unwrap())),
        );
    }

    group.finish();
}

fn bench_merkle_proof_generation(c: &mut Criterion) {
    init_crypto();
    let mut group = c.benchmark_group("merkle_proof_generation");

    for leaf_count in [16u64, 256, 4096].iter() {
        let tree = MerkleTree::new(leaves(*leaf_count)).unwrap();
        let last = (*leaf_count - 1) as usize;
        group.bench_with_input(
            BenchmarkId::from_parameter(leaf_count),
            leaf_count,
            |b, _| b.iter(|| black_box(tree.generate_proof(black_box(last)).unwrap())),
        );
    }

    group.finish();
}

fn bench_commitment(c: &mut Criterion) {
    init_crypto();
    let dsc = parse_certificate(DSC_PEM).unwrap();
    let csca = parse_certificate(CSCA_PEM).unwrap();
    let signer = MockSigner::from_pkcs8(DSC_KEY).unwrap();
    let document = build_mock_document(
        SAMPLE_TD3_MRZ,
        DocumentCategory::Passport,
        MockHashes::default(),
        &signer,
        &dsc.raw,
    )
    .unwrap();
    let metadata = derive_passport_metadata(&document, &dsc, Some(&csca)).unwrap();
    let dsc_leaf = get_leaf_dsc_tree(&dsc, &csca).unwrap();
    let secret = FieldElement::from(42u64);

    c.bench_function("generate_commitment", |b| {
        b.iter(|| {
            black_box(
                generate_commitment(black_box(secret), 1, &document, &metadata, dsc_leaf).unwrap(),
            )
        })
    });

    c.bench_function("generate_nullifier", |b| {
        b.iter(|| black_box(generate_nullifier(black_box(secret), 1).unwrap()))
    });

    c.bench_function("derive_passport_metadata", |b| {
        b.iter(|| black_box(derive_passport_metadata(&document, &dsc, Some(&csca)).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_poseidon,
    bench_merkle_tree_construction,
    bench_merkle_proof_generation,
    bench_commitment
);
criterion_main!(benches);
