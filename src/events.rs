//! Well-known platform event shapes.
//!
//! Field names follow the platform's event catalog. Only the fields a handler
//! plausibly needs are required; everything else is optional so newer event
//! versions keep decoding.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::coercion::{Coerced, EventShape, Input, ParamType, structural};
use crate::error::RuntimeError;

macro_rules! event_input {
    ($ty:ty, $shape:ident) => {
        impl Input for $ty {
            fn param_type() -> ParamType {
                ParamType::Event(EventShape::$shape)
            }

            fn from_coerced(value: Coerced) -> Result<Self, RuntimeError> {
                structural(value)
            }
        }
    };
}

// ── Storage object notifications ──────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records")]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3EventRecord {
    #[serde(default)]
    pub event_version: Option<String>,
    #[serde(default)]
    pub event_source: Option<String>,
    #[serde(default)]
    pub aws_region: Option<String>,
    #[serde(default)]
    pub event_time: Option<String>,
    pub event_name: String,
    #[serde(default)]
    pub user_identity: Option<S3UserIdentity>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3UserIdentity {
    pub principal_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Entity {
    #[serde(default)]
    pub s3_schema_version: Option<String>,
    #[serde(default)]
    pub configuration_id: Option<String>,
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct S3Bucket {
    pub name: String,
    #[serde(default)]
    pub arn: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct S3Object {
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub e_tag: Option<String>,
    #[serde(default)]
    pub version_id: Option<String>,
    #[serde(default)]
    pub sequencer: Option<String>,
}

event_input!(S3Event, S3);

// ── Identity provider sync events ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CognitoEvent {
    pub version: i64,
    pub event_type: String,
    #[serde(default)]
    pub region: Option<String>,
    pub identity_pool_id: String,
    pub identity_id: String,
    pub dataset_name: String,
    #[serde(default)]
    pub dataset_records: HashMap<String, CognitoDatasetRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CognitoDatasetRecord {
    #[serde(default)]
    pub old_value: Option<String>,
    #[serde(default)]
    pub new_value: Option<String>,
    pub op: String,
}

event_input!(CognitoEvent, Cognito);

// ── Config rule evaluations ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEvent {
    #[serde(default)]
    pub version: Option<String>,
    /// JSON document encoded as a string.
    pub invoking_event: String,
    #[serde(default)]
    pub rule_parameters: Option<String>,
    pub result_token: String,
    #[serde(default)]
    pub config_rule_arn: Option<String>,
    #[serde(default)]
    pub config_rule_id: Option<String>,
    #[serde(default)]
    pub config_rule_name: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub execution_role_arn: Option<String>,
    #[serde(default)]
    pub event_left_scope: bool,
}

impl ConfigEvent {
    /// Parse the nested invoking event document.
    pub fn invoking_event_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.invoking_event)
    }
}

event_input!(ConfigEvent, Config);

// ── Change-data-capture batches ───────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamodbEvent {
    #[serde(rename = "Records")]
    pub records: Vec<DynamodbEventRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DynamodbEventRecord {
    #[serde(rename = "eventID", default)]
    pub event_id: Option<String>,
    pub event_name: String,
    #[serde(default)]
    pub event_version: Option<String>,
    #[serde(default)]
    pub event_source: Option<String>,
    #[serde(default)]
    pub aws_region: Option<String>,
    #[serde(rename = "eventSourceARN", default)]
    pub event_source_arn: Option<String>,
    pub dynamodb: StreamRecord,
}

/// Attribute maps stay as JSON trees; their typed encoding is table-specific.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct StreamRecord {
    #[serde(default)]
    pub keys: HashMap<String, Value>,
    #[serde(default)]
    pub new_image: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub old_image: Option<HashMap<String, Value>>,
    #[serde(default)]
    pub sequence_number: Option<String>,
    #[serde(default)]
    pub size_bytes: Option<u64>,
    #[serde(default)]
    pub stream_view_type: Option<String>,
    #[serde(default)]
    pub approximate_creation_date_time: Option<f64>,
}

event_input!(DynamodbEvent, Dynamodb);

// ── Stream shard records ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KinesisEvent {
    #[serde(rename = "Records")]
    pub records: Vec<KinesisEventRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KinesisEventRecord {
    #[serde(rename = "eventID", default)]
    pub event_id: Option<String>,
    #[serde(default)]
    pub event_name: Option<String>,
    #[serde(default)]
    pub event_source: Option<String>,
    #[serde(rename = "eventSourceARN", default)]
    pub event_source_arn: Option<String>,
    #[serde(default)]
    pub aws_region: Option<String>,
    pub kinesis: KinesisRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KinesisRecord {
    pub partition_key: String,
    /// Base64-encoded record payload.
    pub data: String,
    pub sequence_number: String,
    #[serde(default)]
    pub kinesis_schema_version: Option<String>,
    #[serde(default)]
    pub approximate_arrival_timestamp: Option<f64>,
}

impl KinesisRecord {
    /// Decoded record payload.
    pub fn data_bytes(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.data)
    }
}

event_input!(KinesisEvent, Kinesis);

// ── Pub/sub notifications ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnsEvent {
    #[serde(rename = "Records")]
    pub records: Vec<SnsEventRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SnsEventRecord {
    #[serde(default)]
    pub event_source: Option<String>,
    #[serde(default)]
    pub event_version: Option<String>,
    #[serde(default)]
    pub event_subscription_arn: Option<String>,
    pub sns: SnsMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SnsMessage {
    #[serde(rename = "Type", default)]
    pub kind: Option<String>,
    pub message_id: String,
    pub topic_arn: String,
    #[serde(default)]
    pub subject: Option<String>,
    pub message: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub message_attributes: HashMap<String, Value>,
}

event_input!(SnsEvent, Sns);

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    pub(crate) fn s3_put() -> Value {
        json!({
            "Records": [{
                "eventVersion": "2.0",
                "eventSource": "aws:s3",
                "awsRegion": "us-east-1",
                "eventTime": "1970-01-01T00:00:00.000Z",
                "eventName": "ObjectCreated:Put",
                "userIdentity": {"principalId": "EXAMPLE"},
                "requestParameters": {"sourceIPAddress": "127.0.0.1"},
                "s3": {
                    "s3SchemaVersion": "1.0",
                    "configurationId": "testConfigRule",
                    "bucket": {
                        "name": "sourcebucket",
                        "ownerIdentity": {"principalId": "EXAMPLE"},
                        "arn": "arn:aws:s3:::sourcebucket"
                    },
                    "object": {"key": "HappyFace.jpg", "size": 1024, "eTag": "d41d8cd98f00b204e9800998ecf8427e"}
                }
            }]
        })
    }

    #[test]
    fn s3_event_decodes() {
        let ev = S3Event::from_coerced(Coerced::Tree(s3_put())).unwrap();
        assert_eq!(ev.records.len(), 1);
        assert_eq!(ev.records[0].event_name, "ObjectCreated:Put");
        assert_eq!(ev.records[0].s3.bucket.name, "sourcebucket");
        assert_eq!(ev.records[0].s3.object.size, Some(1024));
        assert_eq!(S3Event::param_type(), ParamType::Event(EventShape::S3));
    }

    #[test]
    fn s3_missing_key_names_path() {
        let mut tree = s3_put();
        tree["Records"][0]["s3"]["object"]
            .as_object_mut()
            .unwrap()
            .remove("key");
        match S3Event::from_coerced(Coerced::Tree(tree)).unwrap_err() {
            RuntimeError::Coercion { path, message } => {
                assert_eq!(path, "Records[0].s3.object");
                assert!(message.contains("key"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn sns_event_decodes() {
        let tree = json!({
            "Records": [{
                "EventSource": "aws:sns",
                "EventVersion": "1.0",
                "Sns": {
                    "Type": "Notification",
                    "MessageId": "95df01b4",
                    "TopicArn": "arn:aws:sns:us-east-1:123:topic",
                    "Subject": "hi",
                    "Message": "Hello from SNS!",
                    "Timestamp": "1970-01-01T00:00:00.000Z",
                    "MessageAttributes": {"Test": {"Type": "String", "Value": "TestString"}}
                }
            }]
        });
        let ev = SnsEvent::from_coerced(Coerced::Tree(tree)).unwrap();
        assert_eq!(ev.records[0].sns.message, "Hello from SNS!");
        assert_eq!(ev.records[0].sns.kind.as_deref(), Some("Notification"));
    }

    #[test]
    fn kinesis_data_is_base64() {
        let tree = json!({
            "Records": [{
                "eventID": "shardId-000:1",
                "eventSource": "aws:kinesis",
                "kinesis": {
                    "partitionKey": "pk",
                    "data": "SGVsbG8sIHRoaXMgaXMgYSB0ZXN0Lg==",
                    "sequenceNumber": "4959"
                }
            }]
        });
        let ev = KinesisEvent::from_coerced(Coerced::Tree(tree)).unwrap();
        assert_eq!(ev.records[0].kinesis.data_bytes().unwrap(), b"Hello, this is a test.");
    }

    #[test]
    fn dynamodb_event_decodes() {
        let tree = json!({
            "Records": [{
                "eventID": "1",
                "eventName": "INSERT",
                "eventSourceARN": "arn:aws:dynamodb:us-east-1:123:table/T/stream/1",
                "dynamodb": {
                    "Keys": {"Id": {"N": "101"}},
                    "NewImage": {"Message": {"S": "New item!"}, "Id": {"N": "101"}},
                    "SequenceNumber": "111",
                    "SizeBytes": 26,
                    "StreamViewType": "NEW_AND_OLD_IMAGES"
                }
            }]
        });
        let ev = DynamodbEvent::from_coerced(Coerced::Tree(tree)).unwrap();
        let rec = &ev.records[0];
        assert_eq!(rec.event_name, "INSERT");
        assert_eq!(rec.dynamodb.keys["Id"], json!({"N": "101"}));
        assert_eq!(rec.dynamodb.size_bytes, Some(26));
    }

    #[test]
    fn cognito_event_decodes() {
        let tree = json!({
            "version": 2,
            "eventType": "SyncTrigger",
            "region": "us-east-1",
            "identityPoolId": "pool",
            "identityId": "id",
            "datasetName": "ds",
            "datasetRecords": {"k": {"oldValue": "a", "newValue": "b", "op": "replace"}}
        });
        let ev = CognitoEvent::from_coerced(Coerced::Tree(tree)).unwrap();
        assert_eq!(ev.dataset_records["k"].op, "replace");
    }

    #[test]
    fn config_event_nested_document() {
        let tree = json!({
            "invokingEvent": "{\"messageType\":\"ConfigurationItemChangeNotification\"}",
            "resultToken": "token",
            "eventLeftScope": false
        });
        let ev = ConfigEvent::from_coerced(Coerced::Tree(tree)).unwrap();
        assert_eq!(
            ev.invoking_event_json().unwrap()["messageType"],
            "ConfigurationItemChangeNotification"
        );
    }
}
