use bolero::check;

use dbsake::frm::tablename;

fn main() {
    check!().with_type().for_each(|name: &String| {
        // every identifier survives an encode/decode round trip
        let encoded = tablename::encode(name);
        let decoded = tablename::decode(&encoded).expect("decoding an encoded name");
        assert_eq!(&decoded, name, "encoded form {encoded:?}");

        // the encoded form is itself a fixed point: decoding and
        // re-encoding a valid on-disk name reproduces it
        let reencoded = tablename::encode(&decoded);
        assert_eq!(reencoded, encoded);

        // encoded names only contain filesystem-safe bytes
        assert!(
            encoded
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'$' | b'@')),
            "unsafe byte in {encoded:?}"
        );
    });
}
