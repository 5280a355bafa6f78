use criterion::{Criterion, criterion_group, criterion_main};
use sproto_core::pack;

fn gen_sparse(total_bytes: usize) -> Vec<u8> {
    let mut data = vec![0u8; total_bytes];
    for i in (0..total_bytes).step_by(37) {
        data[i] = (i % 256) as u8;
    }
    data
}

fn gen_dense(total_bytes: usize) -> Vec<u8> {
    (0..total_bytes).map(|i| (i * 31 % 256) as u8).collect()
}

fn bench_pack_unpack(c: &mut Criterion) {
    for &size in &[64usize, 1024, 16384] {
        let sparse = gen_sparse(size);
        c.bench_function(&format!("pack_sparse_{size}"), |b| b.iter(|| pack::pack(&sparse)));
        let packed_sparse = pack::pack(&sparse);
        c.bench_function(&format!("unpack_sparse_{size}"), |b| {
            b.iter(|| pack::unpack(&packed_sparse).unwrap())
        });

        let dense = gen_dense(size);
        c.bench_function(&format!("pack_dense_{size}"), |b| b.iter(|| pack::pack(&dense)));
        let packed_dense = pack::pack(&dense);
        c.bench_function(&format!("unpack_dense_{size}"), |b| {
            b.iter(|| pack::unpack(&packed_dense).unwrap())
        });
    }
}

criterion_group!(benches, bench_pack_unpack);
criterion_main!(benches);
