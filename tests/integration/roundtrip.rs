use std::collections::BTreeMap;

use txtline_core::fragment::reassemble;
use txtline_core::names::record_kind;
use txtline_core::{ChannelMapper, Encoding, Fragmenter, ProtocolConfig, RecordKind, TxtRecord};

use crate::*;

fn upload_body(records: &[TxtRecord], id: &str, manifest: &str) -> serde_json::Value {
    let chunks: BTreeMap<&str, &str> = records
        .iter()
        .filter(|r| record_kind(&r.name) == Some(RecordKind::Frame))
        .map(|r| (r.name.as_str(), r.value.as_str()))
        .collect();
    serde_json::json!({ "message_id": id, "chunks": chunks, "manifest": manifest })
}

/// Upload a fragmented buffer, look every record up over HTTP and
/// reassemble the original bytes.
#[tokio::test]
async fn test_upload_lookup_reassemble() {
    let d = Daemon::in_memory().await.unwrap();

    for encoding in [Encoding::Hex, Encoding::Base32] {
        let data: Vec<u8> = (0..3000u32).map(|i| (i * 7 % 251) as u8).collect();
        let protocol = ProtocolConfig::with_encoding(encoding);
        let msg = Fragmenter::new(protocol.clone()).fragment(&data).unwrap();
        let mapper = ChannelMapper::new(ChannelConfig::default(), protocol);
        let (manifest, records) = mapper.encode_message(&msg);

        let (code, resp) = d
            .post("/upload", &upload_body(&records, &manifest.message_id, &manifest.value()))
            .await
            .unwrap();
        assert_eq!(code, 200, "{resp}");
        assert_eq!(resp["status"], "success");
        assert_eq!(resp["chunks"], msg.frames.len());

        let mut fetched = Vec::new();
        let (code, m) = d
            .get(&format!("/lookup/{}", mapper.manifest_name(&manifest.message_id)))
            .await
            .unwrap();
        assert_eq!(code, 200);
        assert_eq!(m["type"], "TXT");
        assert_eq!(m["ttl"], 300);
        fetched.push(serde_json::from_value::<TxtRecord>(m).unwrap());

        for seq in 0..msg.frames.len() as u16 {
            let (code, r) = d
                .get(&format!("/lookup/{}", mapper.frame_name(seq, &manifest.message_id)))
                .await
                .unwrap();
            assert_eq!(code, 200, "frame {seq}");
            fetched.push(serde_json::from_value::<TxtRecord>(r).unwrap());
        }

        let (frames, parsed) = mapper.parse_batch(&fetched);
        assert_eq!(parsed.unwrap().total_frames, msg.frames.len());
        assert_eq!(reassemble(frames).unwrap(), &data[..]);
    }
}

#[tokio::test]
async fn test_lookup_miss_is_404() {
    let d = Daemon::in_memory().await.unwrap();
    let (code, body) = d.get("/lookup/m-nothing.data.covert.example.com").await.unwrap();
    assert_eq!(code, 404);
    assert_eq!(body, "not found");
}

#[tokio::test]
async fn test_upload_rejections() {
    let d = Daemon::in_memory().await.unwrap();
    let body = serde_json::json!({
        "message_id": "abcd",
        "chunks": { "c-0-abcd.data.covert.example.com": "00" },
        "manifest": "1:pending:0",
    });

    let (code, _) = d.post("/upload", &body).await.unwrap();
    assert_eq!(code, 200);

    let (code, text) = d.post("/upload", &body).await.unwrap();
    assert_eq!(code, 409);
    assert!(text.as_str().unwrap().contains("already exists"));

    let empty = serde_json::json!({ "message_id": "ef01", "chunks": {}, "manifest": "" });
    let (code, _) = d.post("/upload", &empty).await.unwrap();
    assert_eq!(code, 400);
}
