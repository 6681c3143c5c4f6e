use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use voxpipe_protocol::cursor::ByteWriter;
use voxpipe_protocol::rtp::{RtpHeader, RtpPacket};

fn bench_header_write(c: &mut Criterion) {
    let header = RtpHeader::new(1000, 960_000, 0x1122_3344);
    let mut writer = ByteWriter::with_size(2048);

    c.bench_function("rtp_header_write", |b| {
        b.iter(|| {
            writer.reset();
            black_box(&header).write(&mut writer).unwrap();
            black_box(writer.position());
        });
    });
}

fn bench_header_read(c: &mut Criterion) {
    let bytes = RtpHeader::new(1000, 960_000, 0x1122_3344).to_bytes().unwrap();

    c.bench_function("rtp_header_read", |b| {
        b.iter(|| {
            let header = RtpHeader::from_bytes(black_box(&bytes)).unwrap();
            black_box(header);
        });
    });
}

fn bench_packet_roundtrip(c: &mut Criterion) {
    let payload = Bytes::from(vec![0u8; 160]); // Typical Opus frame
    let packet = RtpPacket::new(RtpHeader::new(1, 0, 1), payload, 0);

    let mut group = c.benchmark_group("rtp_packet");
    group.throughput(Throughput::Bytes(packet.size() as u64));
    group.bench_function("roundtrip", |b| {
        b.iter(|| {
            let bytes = black_box(&packet).to_bytes().unwrap();
            let decoded = RtpPacket::from_bytes(&bytes).unwrap();
            black_box(decoded);
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_header_write,
    bench_header_read,
    bench_packet_roundtrip
);
criterion_main!(benches);
