macro_rules! test_roundtrip {
    ($t:ty, $name:ident) => {
        #[allow(unused_imports)]
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig{fork: false, ..Default::default()})]
            #[test]
            fn $name(orig: $t) {
                #[allow(unused_imports)]
                use std::io::Cursor;

                let mut buf = Cursor::new(Vec::<u8>::new());
                match orig.write(&mut buf) {
                    Err(_) => {
                        // skip
                    }
                    Ok(()) => {
                        buf.set_position(0);
                        let restored_1 = <$t>::read(&mut buf).unwrap();

                        // `orig` and `restored` might be different here, so we need another roundtrip
                        let mut buf = Cursor::new(Vec::<u8>::new());
                        restored_1.write(&mut buf).unwrap();

                        let l = buf.position();
                        buf.set_position(0);

                        let restored_2 = <$t>::read(&mut buf).unwrap();
                        assert_eq!(restored_1, restored_2);

                        assert_eq!(buf.position(), l);
                    }
                }
            }
        }
    };
}

pub(crate) use test_roundtrip;

/// Metadata response frame, without length prefix, captured from a two-broker cluster with a single four-partition
/// topic.
pub(crate) const TWO_BROKERS_ONE_TOPIC: &[u8] = &[
    0, 0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 2, 0, 13, 49, 57, 50, 46, 49, 54, 56, 46, 52, 52, 46, 49,
    49, 0, 0, 35, 134, 0, 0, 0, 1, 0, 13, 49, 57, 50, 46, 49, 54, 56, 46, 52, 52, 46, 49, 49,
    0, 0, 35, 133, 0, 0, 0, 1, 0, 0, 0, 7, 116, 111, 112, 105, 99, 48, 49, 0, 0, 0, 4, 0, 0, 0,
    0, 0, 0, 0, 0, 0, 2, 0, 0, 0, 2, 0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0,
    0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0,
    0, 0, 2, 0, 0, 0, 2, 0, 0, 0, 2, 0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0,
    0, 0, 3, 0, 0, 0, 2, 0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0, 2, 0, 0, 0, 1, 0, 0, 0, 2,
];
