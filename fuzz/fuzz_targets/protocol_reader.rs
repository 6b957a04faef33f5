#![no_main]
use std::io::Cursor;

use kafka_basic::protocol::{
    messages::{FetchResponse, ListOffsetsResponse, MetadataResponse, ProduceResponse},
    record::MessageSet,
    traits::ReadType,
};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Some((selector, data)) = data.split_first() else {
        return;
    };

    let mut cursor = Cursor::new(data);
    match selector % 5 {
        0 => {
            MetadataResponse::read(&mut cursor).ok();
        }
        1 => {
            ProduceResponse::read(&mut cursor).ok();
        }
        2 => {
            if let Ok(resp) = FetchResponse::read(&mut cursor) {
                for topic in &resp.responses {
                    for partition in &topic.partitions {
                        partition.records.iter().for_each(drop);
                    }
                }
            }
        }
        3 => {
            ListOffsetsResponse::read(&mut cursor).ok();
        }
        _ => {
            MessageSet::from_bytes(data.to_vec()).iter().for_each(drop);
        }
    }
});
