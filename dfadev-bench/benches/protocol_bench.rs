//! Protocol encoding/decoding benchmarks.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dfadev_protocol::frame::Frame;
use dfadev_protocol::message::{Operation, ReadResult, Request, Response, WriteParams};
use dfadev_protocol::{Decoder, Encoder};

fn write_request(size: usize) -> Request {
    Request::new("bench-1", Operation::Write)
        .with_params(&WriteParams::new(vec![b'a'; size]))
        .unwrap()
}

fn read_response(size: usize) -> Response {
    let result = ReadResult {
        data: vec![b'Y'; size],
    };
    Response::ok("bench-1", serde_json::to_value(result).unwrap())
}

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    for size in [100, 1000, 10000] {
        let frame = Frame::new(Bytes::from("x".repeat(size)));

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| black_box(frame.encode().unwrap()));
        });
    }

    group.finish();
}

fn bench_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");

    for size in [100, 1000, 10000] {
        let encoded = Frame::new(Bytes::from("x".repeat(size))).encode().unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut buf = encoded.clone();
                black_box(Frame::decode(&mut buf).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_write_request(c: &mut Criterion) {
    let mut group = c.benchmark_group("write_request");

    for size in [16, 4096, 65536] {
        let request = write_request(size);
        let encoded = Encoder::encode_request(&request).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("encode", size), &request, |b, request| {
            b.iter(|| black_box(Encoder::encode_request(request).unwrap()));
        });
        group.bench_with_input(BenchmarkId::new("decode", size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut decoder = Decoder::new();
                decoder.extend(encoded);
                let request = decoder.decode_request().unwrap().unwrap();
                black_box(request.parse_params::<WriteParams>().unwrap())
            });
        });
    }

    group.finish();
}

fn bench_read_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("read_response");

    for size in [1, 4096, 65536] {
        let encoded = Encoder::encode_response(&read_response(size)).unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut decoder = Decoder::new();
                decoder.extend(encoded);
                let response = decoder.decode_response().unwrap().unwrap();
                black_box(response.parse_result::<ReadResult>().unwrap())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_encode,
    bench_frame_decode,
    bench_write_request,
    bench_read_response,
);

criterion_main!(benches);
