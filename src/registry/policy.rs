//! Access and redrive policy documents

use crate::error::{MessagingError, MessagingResult};
use serde_json::json;

const TOPIC_ACTIONS: [&str; 9] = [
    "SNS:GetTopicAttributes",
    "SNS:SetTopicAttributes",
    "SNS:AddPermission",
    "SNS:RemovePermission",
    "SNS:DeleteTopic",
    "SNS:Subscribe",
    "SNS:ListSubscriptionsByTopic",
    "SNS:Publish",
    "SNS:Receive",
];

/// Topic policy restricting topic operations to the owning account
pub fn topic_access_policy(topic_arn: &str) -> MessagingResult<String> {
    let account_id = account_id_from_arn(topic_arn)?;

    let policy = json!({
        "Version": "2008-10-17",
        "Id": policy_id(),
        "Statement": [{
            "Sid": policy_id(),
            "Effect": "Allow",
            "Principal": { "AWS": "*" },
            "Action": TOPIC_ACTIONS,
            "Resource": topic_arn,
            "Condition": {
                "StringEquals": { "AWS:SourceOwner": account_id }
            }
        }]
    });

    Ok(policy.to_string())
}

/// Queue policy allowing the topic to deliver into the queue
pub fn queue_access_policy(topic_arn: &str, queue_arn: &str) -> String {
    json!({
        "Version": "2012-10-17",
        "Id": policy_id(),
        "Statement": [{
            "Sid": policy_id(),
            "Effect": "Allow",
            "Principal": { "Service": "sns.amazonaws.com" },
            "Action": ["sqs:SendMessage"],
            "Resource": queue_arn,
            "Condition": {
                "ArnEquals": { "AWS:SourceArn": topic_arn }
            }
        }]
    })
    .to_string()
}

/// Redrive policy routing messages to the error queue after `max_receive_count` receives
pub fn redrive_policy(error_queue_arn: &str, max_receive_count: u32) -> String {
    json!({
        "deadLetterTargetArn": error_queue_arn,
        "maxReceiveCount": max_receive_count.to_string(),
    })
    .to_string()
}

/// Account ID segment of an ARN
pub fn account_id_from_arn(arn: &str) -> MessagingResult<&str> {
    arn.split(':')
        .nth(4)
        .ok_or_else(|| MessagingError::Resolution(format!("invalid arn: {}", arn)))
}

fn policy_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    const TOPIC_ARN: &str = "arn:aws:sns:eu-west-1:111122223333:stage-orders-v1-OrderPlaced";
    const QUEUE_ARN: &str = "arn:aws:sqs:eu-west-1:111122223333:stage-billing-orders-v1-OrderPlaced";

    #[test]
    fn test_topic_access_policy() {
        let policy: Value = serde_json::from_str(&topic_access_policy(TOPIC_ARN).unwrap()).unwrap();
        let statement = &policy["Statement"][0];

        assert_eq!(statement["Resource"], TOPIC_ARN);
        assert_eq!(
            statement["Condition"]["StringEquals"]["AWS:SourceOwner"],
            "111122223333"
        );
        assert_eq!(statement["Action"].as_array().unwrap().len(), 9);
        assert!(!policy["Id"].as_str().unwrap().contains('-'));
    }

    #[test]
    fn test_topic_access_policy_rejects_invalid_arn() {
        assert!(matches!(
            topic_access_policy("invalid"),
            Err(MessagingError::Resolution(_))
        ));
    }

    #[test]
    fn test_queue_access_policy() {
        let policy: Value = serde_json::from_str(&queue_access_policy(TOPIC_ARN, QUEUE_ARN)).unwrap();
        let statement = &policy["Statement"][0];

        assert_eq!(statement["Resource"], QUEUE_ARN);
        assert_eq!(statement["Condition"]["ArnEquals"]["AWS:SourceArn"], TOPIC_ARN);
        assert_eq!(statement["Principal"]["Service"], "sns.amazonaws.com");
    }

    #[test]
    fn test_redrive_policy() {
        let policy: Value = serde_json::from_str(&redrive_policy(QUEUE_ARN, 5)).unwrap();

        assert_eq!(policy["deadLetterTargetArn"], QUEUE_ARN);
        assert_eq!(policy["maxReceiveCount"], "5");
    }

    #[test]
    fn test_account_id_from_arn() {
        assert_eq!(account_id_from_arn(TOPIC_ARN).unwrap(), "111122223333");
        assert!(account_id_from_arn("arn:aws:sns").is_err());
    }
}
