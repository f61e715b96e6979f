//! Shared DynamoDB plumbing for the table-backed repositories: X-Ray friendly
//! client spans, SDK error mapping and attribute decoding helpers.

use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Error as DynamoDbError;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::error;

use crate::models::{RepositoryError, RepositoryResult};

pub(crate) type Item = HashMap<String, AttributeValue>;

/// Create a DynamoDB subsegment span with X-Ray attributes
pub(crate) fn dynamodb_span(table_name: &str, region: &str, operation: &str) -> tracing::Span {
    tracing::info_span!(
        "DynamoDB",
        "aws.service" = "DynamoDB",
        "aws.operation" = operation,
        "aws.region" = %region,
        "aws.dynamodb.table_name" = %table_name,
        "aws.remote.service" = "AWS::DynamoDB",
        "aws.remote.operation" = operation,
        "aws.remote.resource.type" = "AWS::DynamoDB::Table",
        "aws.remote.resource.identifier" = %table_name,
        "otel.kind" = "client",
        "otel.name" = format!("DynamoDB.{}", operation),
        "rpc.system" = "aws-api",
        "rpc.service" = "AmazonDynamoDBv2",
        "rpc.method" = operation,
        "db.system" = "dynamodb",
        "db.name" = %table_name,
        "db.operation" = operation,
    )
}

/// Convert DynamoDB error to RepositoryError
pub(crate) fn map_dynamodb_error(error: DynamoDbError) -> RepositoryError {
    error!("DynamoDB error: {:?}", error);
    match error {
        DynamoDbError::ResourceNotFoundException(_) => RepositoryError::NotFound,
        other => RepositoryError::AwsSdk {
            message: other.to_string(),
        },
    }
}

/// Fixed-width timestamp so stored values sort lexicographically
pub(crate) fn timestamp_attr(timestamp: &DateTime<Utc>) -> AttributeValue {
    AttributeValue::S(timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))
}

pub(crate) fn decimal_attr(value: &Decimal) -> AttributeValue {
    AttributeValue::N(value.to_string())
}

pub(crate) fn get_string(item: &Item, key: &str) -> RepositoryResult<String> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| invalid(format!("Missing {}", key)))
}

pub(crate) fn get_decimal(item: &Item, key: &str) -> RepositoryResult<Decimal> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|s| Decimal::from_str(s).ok())
        .ok_or_else(|| invalid(format!("Invalid {}", key)))
}

pub(crate) fn get_u32(item: &Item, key: &str) -> RepositoryResult<u32> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid(format!("Invalid {}", key)))
}

pub(crate) fn get_f32(item: &Item, key: &str) -> RepositoryResult<f32> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| invalid(format!("Invalid {}", key)))
}

pub(crate) fn get_bool(item: &Item, key: &str) -> RepositoryResult<bool> {
    item.get(key)
        .and_then(|v| v.as_bool().ok())
        .copied()
        .ok_or_else(|| invalid(format!("Invalid {}", key)))
}

pub(crate) fn get_timestamp(item: &Item, key: &str) -> RepositoryResult<DateTime<Utc>> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| invalid(format!("Invalid {}", key)))
}

pub(crate) fn get_list<'a>(item: &'a Item, key: &str) -> &'a [AttributeValue] {
    item.get(key)
        .and_then(|v| v.as_l().ok())
        .map(|list| list.as_slice())
        .unwrap_or_default()
}

fn invalid(message: String) -> RepositoryError {
    RepositoryError::InvalidRecord { message }
}
