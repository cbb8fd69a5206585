//! User pool construct

use apistack_core::intrinsic::{get_att, reference};
use apistack_core::{DeletionPolicy, LogicalId, Resource};
use serde_json::{json, Value};

use crate::client::{UserPoolClient, UserPoolClientProps};
use crate::error::CognitoError;
use crate::password::PasswordPolicy;

pub const RESOURCE_TYPE: &str = "AWS::Cognito::UserPool";

const VERIFICATION_MESSAGE: &str = "The verification code to your new account is {####}";
const VERIFICATION_SUBJECT: &str = "Verify your new account";

/// How users recover a forgotten password
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AccountRecovery {
    EmailOnly,
    PhoneOnlyWithoutMfa,
    #[default]
    PhoneWithoutMfaAndEmail,
    EmailAndPhoneWithoutMfa,
    /// Only an administrator can reset passwords
    None,
}

impl AccountRecovery {
    fn to_cfn(self) -> Value {
        let mechanisms: &[&str] = match self {
            Self::EmailOnly => &["verified_email"],
            Self::PhoneOnlyWithoutMfa => &["verified_phone_number"],
            Self::PhoneWithoutMfaAndEmail => &["verified_phone_number", "verified_email"],
            Self::EmailAndPhoneWithoutMfa => &["verified_email", "verified_phone_number"],
            Self::None => &["admin_only"],
        };
        let mechanisms: Vec<Value> = mechanisms
            .iter()
            .zip(1..)
            .map(|(name, priority)| json!({ "Name": name, "Priority": priority }))
            .collect();
        json!({ "RecoveryMechanisms": mechanisms })
    }
}

/// Who sends the pool's emails
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserPoolEmail {
    /// Cognito's built-in sender, subject to its daily quota
    WithCognito { reply_to: Option<String> },
    /// A verified SES identity
    WithSes {
        from_email: String,
        source_arn: String,
        reply_to: Option<String>,
    },
}

impl Default for UserPoolEmail {
    fn default() -> Self {
        Self::WithCognito { reply_to: None }
    }
}

impl UserPoolEmail {
    fn to_cfn(&self) -> Value {
        match self {
            Self::WithCognito { reply_to } => {
                let mut cfg = json!({ "EmailSendingAccount": "COGNITO_DEFAULT" });
                if let Some(reply_to) = reply_to {
                    cfg["ReplyToEmailAddress"] = json!(reply_to);
                }
                cfg
            }
            Self::WithSes {
                from_email,
                source_arn,
                reply_to,
            } => {
                let mut cfg = json!({
                    "EmailSendingAccount": "DEVELOPER",
                    "From": from_email,
                    "SourceArn": source_arn,
                });
                if let Some(reply_to) = reply_to {
                    cfg["ReplyToEmailAddress"] = json!(reply_to);
                }
                cfg
            }
        }
    }
}

/// Which identifiers users sign in with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignInAliases {
    pub username: bool,
    pub email: bool,
    pub phone: bool,
    pub preferred_username: bool,
}

impl Default for SignInAliases {
    fn default() -> Self {
        Self {
            username: true,
            email: false,
            phone: false,
            preferred_username: false,
        }
    }
}

impl SignInAliases {
    pub fn email_only() -> Self {
        Self {
            username: false,
            email: true,
            phone: false,
            preferred_username: false,
        }
    }

    fn validate(self) -> Result<(), CognitoError> {
        if !(self.username || self.email || self.phone || self.preferred_username) {
            return Err(CognitoError::InvalidSignInAliases(
                "at least one sign-in alias must be enabled",
            ));
        }
        if self.preferred_username && !self.username {
            return Err(CognitoError::InvalidSignInAliases(
                "preferredUsername can only be enabled together with username",
            ));
        }
        Ok(())
    }

    /// Attributes the pool verifies automatically: whatever users sign in with
    fn auto_verified(self) -> Vec<&'static str> {
        let mut attrs = Vec::new();
        if self.email {
            attrs.push("email");
        }
        if self.phone {
            attrs.push("phone_number");
        }
        attrs
    }

    /// (`UsernameAttributes`, `AliasAttributes`); at most one is set
    fn attribute_lists(self) -> (Option<Vec<&'static str>>, Option<Vec<&'static str>>) {
        let mut attrs = Vec::new();
        if self.email {
            attrs.push("email");
        }
        if self.phone {
            attrs.push("phone_number");
        }
        if self.username {
            if self.preferred_username {
                attrs.push("preferred_username");
            }
            let aliases = if attrs.is_empty() { None } else { Some(attrs) };
            (None, aliases)
        } else {
            (Some(attrs), None)
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserPoolProps {
    pub account_recovery: AccountRecovery,
    pub email: UserPoolEmail,
    pub sign_in_aliases: SignInAliases,
    pub password_policy: PasswordPolicy,
    pub deletion_protection: bool,
    pub self_sign_up_enabled: bool,
    pub removal_policy: DeletionPolicy,
}

impl Default for UserPoolProps {
    fn default() -> Self {
        Self {
            account_recovery: AccountRecovery::default(),
            email: UserPoolEmail::default(),
            sign_in_aliases: SignInAliases::default(),
            password_policy: PasswordPolicy::default(),
            deletion_protection: false,
            self_sign_up_enabled: false,
            removal_policy: DeletionPolicy::Retain,
        }
    }
}

#[derive(Debug, Clone)]
pub struct UserPool {
    construct_id: String,
    logical_id: LogicalId,
    props: UserPoolProps,
}

impl UserPool {
    pub fn new(construct_id: &str, props: UserPoolProps) -> Result<Self, CognitoError> {
        props.sign_in_aliases.validate()?;
        props.password_policy.validate_settings()?;
        Ok(Self {
            construct_id: construct_id.to_string(),
            logical_id: LogicalId::from_path(&[construct_id, "Resource"]),
            props,
        })
    }

    pub fn construct_id(&self) -> &str {
        &self.construct_id
    }

    pub fn logical_id(&self) -> &LogicalId {
        &self.logical_id
    }

    pub fn props(&self) -> &UserPoolProps {
        &self.props
    }

    pub fn password_policy(&self) -> &PasswordPolicy {
        &self.props.password_policy
    }

    /// Deploy-time user pool id
    pub fn user_pool_id(&self) -> Value {
        reference(self.logical_id.as_str())
    }

    pub fn arn(&self) -> Value {
        get_att(self.logical_id.as_str(), "Arn")
    }

    /// Register an OAuth client of this pool as a child construct
    pub fn add_client(
        &self,
        construct_id: &str,
        props: UserPoolClientProps,
    ) -> Result<UserPoolClient, CognitoError> {
        UserPoolClient::new(self, construct_id, props)
    }

    pub fn to_resource(&self) -> Resource {
        let props = &self.props;
        let (username_attributes, alias_attributes) = props.sign_in_aliases.attribute_lists();
        let auto_verified = props.sign_in_aliases.auto_verified();

        Resource::new(RESOURCE_TYPE)
            .property("AccountRecoverySetting", props.account_recovery.to_cfn())
            .property(
                "AdminCreateUserConfig",
                json!({ "AllowAdminCreateUserOnly": !props.self_sign_up_enabled }),
            )
            .property("AliasAttributes", json!(alias_attributes))
            .property(
                "AutoVerifiedAttributes",
                if auto_verified.is_empty() { Value::Null } else { json!(auto_verified) },
            )
            .property(
                "DeletionProtection",
                if props.deletion_protection { "ACTIVE" } else { "INACTIVE" },
            )
            .property("EmailConfiguration", props.email.to_cfn())
            .property("EmailVerificationMessage", VERIFICATION_MESSAGE)
            .property("EmailVerificationSubject", VERIFICATION_SUBJECT)
            .property(
                "Policies",
                json!({ "PasswordPolicy": props.password_policy.to_cfn() }),
            )
            .property("SmsVerificationMessage", VERIFICATION_MESSAGE)
            .property("UsernameAttributes", json!(username_attributes))
            .property(
                "VerificationMessageTemplate",
                json!({
                    "DefaultEmailOption": "CONFIRM_WITH_CODE",
                    "EmailMessage": VERIFICATION_MESSAGE,
                    "EmailSubject": VERIFICATION_SUBJECT,
                    "SmsMessage": VERIFICATION_MESSAGE,
                }),
            )
            .removal_policy(props.removal_policy)
    }
}
