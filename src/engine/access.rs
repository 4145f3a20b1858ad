//! Private archive access: subscriptions and the tokens issued against them.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use super::ArchiveEngine;
use crate::auth::{Claimant, parse_basic_auth};
use crate::error::{Error, Result};
use crate::types::*;

impl ArchiveEngine {
    pub fn new_subscription(
        &self,
        archive_id: i64,
        subscriber_id: i64,
        registrant_id: i64,
        date_expires: Option<DateTime<Utc>>,
        description: Option<&str>,
    ) -> Result<Subscription> {
        let archive = self.archive(archive_id)?;
        let subscriber = self.person(subscriber_id)?;

        if !archive.private {
            return Err(Error::ArchiveNotPrivate(
                "Only private archives can have subscriptions.".to_string(),
            ));
        }

        let now = Utc::now();
        let already = self
            .store
            .list_subscriptions(archive.id)?
            .iter()
            .any(|s| s.subscriber_id == subscriber.id && s.is_valid_at(now));
        if already {
            return Err(Error::AlreadySubscribed(format!(
                "{} already has a current subscription for '{}'.",
                subscriber.display_name, archive.display_name
            )));
        }

        let mut subscription = Subscription {
            id: 0,
            archive_id: archive.id,
            subscriber_id: subscriber.id,
            registrant_id,
            status: SubscriptionStatus::Current,
            description: description.map(str::to_string),
            date_created: now,
            date_expires,
            date_cancelled: None,
            cancelled_by_id: None,
        };
        subscription.id = self.store.create_subscription(&subscription)?;

        info!(archive = %archive.name, subscriber = %subscriber.name, "Subscription created");
        Ok(subscription)
    }

    /// Cancels a subscription and deactivates the personal tokens of anyone
    /// it leaves without access.
    pub fn cancel_subscription(&self, subscription_id: i64, cancelled_by: i64) -> Result<()> {
        let subscription = self
            .store
            .get_subscription(subscription_id)?
            .ok_or(Error::NotFound)?;

        let mut orphaned = Vec::new();
        for token in self.store.list_auth_tokens(subscription.archive_id, true)? {
            let Some(person_id) = token.person_id else {
                continue;
            };
            if !self.valid_subscription_other_than(
                subscription.archive_id,
                person_id,
                Some(subscription.id),
            )? {
                orphaned.push(token.id);
            }
        }

        let deactivated = self.store.cancel_subscription(
            subscription.id,
            cancelled_by,
            Utc::now(),
            &orphaned,
        )?;

        info!(
            archive_id = subscription.archive_id,
            subscription_id,
            deactivated,
            "Subscription cancelled"
        );
        Ok(())
    }

    pub fn subscriptions(&self, archive_id: i64) -> Result<Vec<Subscription>> {
        self.store.list_subscriptions(archive_id)
    }

    /// Whether the person holds a current subscription, directly or through
    /// a subscribed team.
    pub fn has_valid_subscription(&self, archive_id: i64, person_id: i64) -> Result<bool> {
        self.valid_subscription_other_than(archive_id, person_id, None)
    }

    fn valid_subscription_other_than(
        &self,
        archive_id: i64,
        person_id: i64,
        excluded: Option<i64>,
    ) -> Result<bool> {
        let now = Utc::now();
        for subscription in self.store.list_subscriptions(archive_id)? {
            if Some(subscription.id) != excluded
                && subscription.is_valid_at(now)
                && self.membership.in_team(person_id, subscription.subscriber_id)?
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Issues a personal token. The secret is only returned here.
    pub fn new_auth_token(&self, archive_id: i64, person_id: i64) -> Result<IssuedToken> {
        let archive = self.archive(archive_id)?;
        let person = self.person(person_id)?;

        if person.is_team {
            return Err(Error::NoTokensForTeams);
        }
        if !archive.private {
            return Err(Error::ArchiveNotPrivate("Archive must be private.".to_string()));
        }
        if self
            .store
            .get_active_person_token(archive.id, person.id)?
            .is_some()
        {
            return Err(Error::AlreadyExists(format!(
                "active token for {} in {}",
                person.name, archive.name
            )));
        }
        if !self.has_valid_subscription(archive.id, person.id)? {
            return Err(Error::Unauthorized(format!(
                "{} has no valid subscription for '{}'",
                person.display_name, archive.display_name
            )));
        }

        let issued = self.issue_token(&archive, Some(person.id), None)?;
        info!(archive = %archive.name, person = %person.name, "Personal token issued");
        Ok(issued)
    }

    pub fn auth_token(&self, archive_id: i64, person_id: i64) -> Result<Option<AuthToken>> {
        self.store.get_active_person_token(archive_id, person_id)
    }

    pub fn deactivate_auth_token(&self, archive_id: i64, person_id: i64) -> Result<()> {
        let token = self
            .store
            .get_active_person_token(archive_id, person_id)?
            .ok_or(Error::NotFound)?;
        self.store.deactivate_auth_token(token.id, Utc::now())?;
        info!(archive_id, person_id, "Personal token deactivated");
        Ok(())
    }

    /// Issues a token not tied to a subscriber, e.g. for a mirror.
    pub fn new_named_auth_token(&self, archive_id: i64, name: &str) -> Result<IssuedToken> {
        let archive = self.archive(archive_id)?;

        if !archive.private {
            return Err(Error::ArchiveNotPrivate("Archive must be private.".to_string()));
        }
        if name.trim().is_empty() {
            return Err(Error::InvalidName("token name must not be empty".to_string()));
        }
        if self.store.get_active_named_token(archive.id, name)?.is_some() {
            return Err(Error::DuplicateTokenName(format!(
                "An active token with name {name} for archive {} already exists.",
                archive.display_name
            )));
        }

        let issued = self.issue_token(&archive, None, Some(name))?;
        info!(archive = %archive.name, name, "Named token issued");
        Ok(issued)
    }

    pub fn named_auth_tokens(&self, archive_id: i64) -> Result<Vec<AuthToken>> {
        Ok(self
            .store
            .list_auth_tokens(archive_id, true)?
            .into_iter()
            .filter(|token| token.name.is_some())
            .collect())
    }

    pub fn revoke_named_auth_token(&self, archive_id: i64, name: &str) -> Result<()> {
        let token = self
            .store
            .get_active_named_token(archive_id, name)?
            .ok_or(Error::NotFound)?;
        self.store.deactivate_auth_token(token.id, Utc::now())?;
        info!(archive_id, name, "Named token revoked");
        Ok(())
    }

    /// Resolves an HTTP Basic credential to the active token it presents.
    /// Wrong secrets and lapsed subscriptions yield `None`.
    pub fn verify_basic_auth(&self, archive_id: i64, header: &str) -> Result<Option<AuthToken>> {
        let Some((claimant, secret)) = parse_basic_auth(header) else {
            return Ok(None);
        };
        let Ok((lookup, _)) = self.tokens.parse(&secret) else {
            debug!(archive_id, "Malformed archive token");
            return Ok(None);
        };

        let token = match &claimant {
            Claimant::Person(name) => match self.store.get_person_by_name(name)? {
                Some(person) => self.store.get_active_person_token(archive_id, person.id)?,
                None => None,
            },
            Claimant::Named(name) => self.store.get_active_named_token(archive_id, name)?,
        };
        let Some(token) = token else {
            return Ok(None);
        };

        if token.token_lookup != lookup || !self.tokens.verify(&secret, &token.token_hash)? {
            debug!(archive_id, ?claimant, "Archive token rejected");
            return Ok(None);
        }
        if let Some(person_id) = token.person_id {
            if !self.has_valid_subscription(archive_id, person_id)? {
                return Ok(None);
            }
        }

        Ok(Some(token))
    }

    fn issue_token(
        &self,
        archive: &Archive,
        person_id: Option<i64>,
        name: Option<&str>,
    ) -> Result<IssuedToken> {
        let generated = self.tokens.generate()?;
        let mut token = AuthToken {
            id: 0,
            archive_id: archive.id,
            person_id,
            name: name.map(str::to_string),
            token_lookup: generated.lookup,
            token_hash: generated.hash,
            date_created: Utc::now(),
            date_deactivated: None,
        };
        token.id = self.store.create_auth_token(&token)?;

        Ok(IssuedToken {
            token,
            secret: generated.raw,
        })
    }
}
