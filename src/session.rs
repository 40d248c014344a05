//! Pairing state machine: login, candidate lists and spin resolution.
//!
//! The session only holds the pointer to the logged-in participant. All
//! durable state lives in a [`PairingContext`] that callers pass in, so the
//! rules run the same against browser storage and an in-memory store.

use crate::roster::Roster;
use crate::selector::{self, SelectError, WheelSpin};
use crate::storage::{
    KeyValueStore, PairingBook, PairingRecord, PairingStore, Partnership, StoreError,
};
use log::{debug, info, warn};
use rand::Rng;
use std::ops::RangeInclusive;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("'{0}' is not on the roster")]
    NameNotFound(String),
    #[error("no participant is logged in")]
    NoActiveUser,
    #[error("no partners left to pick from")]
    EmptyCandidateList,
    #[error("'{0}' is not an available partner")]
    PartnerUnavailable(String),
}

impl From<SelectError> for SessionError {
    fn from(err: SelectError) -> Self {
        match err {
            SelectError::EmptyCandidates => Self::EmptyCandidateList,
        }
    }
}

/// Where the active participant stands for the active week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingState {
    NoPartnerYet,
    /// Someone else already picked this participant; the next spin reveals them.
    PendingReveal(String),
    Confirmed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpinKind {
    Created,
    Revealed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpinOutcome {
    pub kind: SpinKind,
    pub week: u32,
    pub partner: String,
    pub record: PairingRecord,
    /// Set when the book could not be written; the match still stands in memory.
    pub persist_error: Option<StoreError>,
}

/// A committed wheel spin together with the names the wheel showed.
#[derive(Debug, Clone, PartialEq)]
pub struct WheelResult {
    pub names: Vec<String>,
    pub spin: WheelSpin,
    pub outcome: SpinOutcome,
}

/// Roster, store and the loaded book for the lifetime of the app.
#[derive(Debug, Clone)]
pub struct PairingContext<S> {
    roster: Roster,
    store: PairingStore<S>,
    book: PairingBook,
}

impl<S: KeyValueStore> PairingContext<S> {
    pub fn load(roster: Roster, store: PairingStore<S>) -> Self {
        let book = store.load();
        info!("Loaded {} pairing records", book.len());
        Self {
            roster,
            store,
            book,
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn book(&self) -> &PairingBook {
        &self.book
    }

    pub fn store(&self) -> &PairingStore<S> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PairingStore<S> {
        &mut self.store
    }

    fn persist(&mut self) -> Result<(), StoreError> {
        self.store.save(&self.book)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ActiveUser {
    name: String,
    week: u32,
    displayed_partner: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    active: Option<ActiveUser>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs in the roster entry matching `raw` and returns its canonical name.
    pub fn submit_name<S: KeyValueStore>(
        &mut self,
        ctx: &mut PairingContext<S>,
        raw: &str,
    ) -> Result<String, SessionError> {
        let name = ctx
            .roster
            .lookup(raw)
            .map(str::to_owned)
            .ok_or_else(|| SessionError::NameNotFound(raw.trim().to_owned()))?;

        let is_new = ctx.book.get(&name).is_none();
        let record = ctx.book.get_or_create(&name);
        let week =
            first_pending_week(record).unwrap_or(record.current_week.saturating_sub(1));
        let displayed_partner = match pairing_state(record, week) {
            PairingState::Confirmed(partner) => Some(partner),
            _ => None,
        };

        if is_new {
            if let Err(err) = ctx.persist() {
                warn!("Record for {} kept in memory only: {}", name, err);
            }
        }

        info!("{} logged in at week {}", name, week);
        self.active = Some(ActiveUser {
            name: name.clone(),
            week,
            displayed_partner,
        });
        Ok(name)
    }

    pub fn active_user(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.name.as_str())
    }

    pub fn active_week(&self) -> Option<u32> {
        self.active.as_ref().map(|active| active.week)
    }

    /// Partner shown on the "current partner" card, if any.
    pub fn displayed_partner(&self) -> Option<&str> {
        self.active
            .as_ref()
            .and_then(|active| active.displayed_partner.as_deref())
    }

    pub fn active_record<'a, S: KeyValueStore>(
        &self,
        ctx: &'a PairingContext<S>,
    ) -> Option<&'a PairingRecord> {
        self.active
            .as_ref()
            .and_then(|active| ctx.book.get(&active.name))
    }

    /// Chronological partnerships of the active participant.
    pub fn history<'a, S: KeyValueStore>(&self, ctx: &'a PairingContext<S>) -> &'a [Partnership] {
        self.active_record(ctx)
            .map(|record| record.partnerships.as_slice())
            .unwrap_or(&[])
    }

    pub fn state<S: KeyValueStore>(
        &self,
        ctx: &PairingContext<S>,
    ) -> Result<PairingState, SessionError> {
        let active = self.active.as_ref().ok_or(SessionError::NoActiveUser)?;
        Ok(match ctx.book.get(&active.name) {
            Some(record) => pairing_state(record, active.week),
            None => PairingState::NoPartnerYet,
        })
    }

    pub fn available_partners<S: KeyValueStore>(
        &self,
        ctx: &PairingContext<S>,
    ) -> Result<Vec<String>, SessionError> {
        let active = self.active.as_ref().ok_or(SessionError::NoActiveUser)?;
        let candidates = match ctx.book.get(&active.name) {
            Some(record) => available_partners(record, &ctx.roster, active.week),
            None => available_partners(&PairingRecord::new(&active.name), &ctx.roster, active.week),
        };
        debug!(
            "{} has {} candidates for week {}",
            active.name,
            candidates.len(),
            active.week
        );
        Ok(candidates)
    }

    /// Applies a spin that landed on `partner`. Both sides of a fresh match
    /// go into the book together and are written in a single save.
    pub fn resolve_spin<S: KeyValueStore>(
        &mut self,
        ctx: &mut PairingContext<S>,
        partner: &str,
    ) -> Result<SpinOutcome, SessionError> {
        let candidates = self.available_partners(ctx)?;
        if !candidates.iter().any(|candidate| candidate == partner) {
            return Err(SessionError::PartnerUnavailable(partner.to_owned()));
        }
        let active = self.active.as_mut().ok_or(SessionError::NoActiveUser)?;

        let mut record = ctx
            .book
            .get(&active.name)
            .cloned()
            .unwrap_or_else(|| PairingRecord::new(&active.name));

        let pending = record
            .partnerships
            .iter_mut()
            .find(|p| p.week == active.week && p.partner == partner && !p.confirmed);

        let (kind, week) = match pending {
            Some(entry) => {
                entry.confirmed = true;
                ctx.book.upsert(record.clone());
                (SpinKind::Revealed, active.week)
            }
            None => {
                let week = record.current_week;
                record.partnerships.push(Partnership {
                    week,
                    partner: partner.to_owned(),
                    confirmed: true,
                });
                record.current_week += 1;

                let mut partner_record = ctx
                    .book
                    .get(partner)
                    .cloned()
                    .unwrap_or_else(|| PairingRecord::new(partner));
                partner_record.partnerships.push(Partnership {
                    week,
                    partner: active.name.clone(),
                    confirmed: false,
                });
                partner_record.current_week = partner_record.current_week.max(week + 1);

                ctx.book.upsert(record.clone());
                ctx.book.upsert(partner_record);
                active.week = week;
                (SpinKind::Created, week)
            }
        };

        active.displayed_partner = Some(partner.to_owned());
        info!(
            "{} matched with {} for week {} ({:?})",
            active.name, partner, week, kind
        );

        let persist_error = ctx.persist().err();
        Ok(SpinOutcome {
            kind,
            week,
            partner: partner.to_owned(),
            record,
            persist_error,
        })
    }

    /// Picks a partner with `rng` and resolves the spin. The selector is not
    /// consulted when nobody is left.
    pub fn spin<S: KeyValueStore, R: Rng + ?Sized>(
        &mut self,
        ctx: &mut PairingContext<S>,
        rng: &mut R,
    ) -> Result<SpinOutcome, SessionError> {
        let candidates = self.available_partners(ctx)?;
        if candidates.is_empty() {
            return Err(SessionError::EmptyCandidateList);
        }
        let partner = selector::pick(&candidates, rng)?.clone();
        self.resolve_spin(ctx, &partner)
    }

    /// Spins the wheel over the current candidates and commits the outcome
    /// right away; the caller only animates towards `spin.rotation_degrees`.
    pub fn spin_wheel<S: KeyValueStore, R: Rng + ?Sized>(
        &mut self,
        ctx: &mut PairingContext<S>,
        previous_rotation: f64,
        turns: RangeInclusive<u32>,
        rng: &mut R,
    ) -> Result<WheelResult, SessionError> {
        let names = self.available_partners(ctx)?;
        if names.is_empty() {
            return Err(SessionError::EmptyCandidateList);
        }
        let spin = selector::spin_wheel(&names, previous_rotation, turns, rng)?;
        let partner = names
            .get(spin.index)
            .cloned()
            .ok_or(SessionError::EmptyCandidateList)?;
        let outcome = self.resolve_spin(ctx, &partner)?;
        Ok(WheelResult {
            names,
            spin,
            outcome,
        })
    }

    /// Hides the current partner card and moves on to the next open week.
    pub fn start_new_week<S: KeyValueStore>(
        &mut self,
        ctx: &PairingContext<S>,
    ) -> Result<(), SessionError> {
        let active = self.active.as_mut().ok_or(SessionError::NoActiveUser)?;
        active.week = match ctx.book.get(&active.name) {
            Some(record) => first_pending_week(record).unwrap_or(record.current_week),
            None => 1,
        };
        active.displayed_partner = None;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.active = None;
    }
}

pub fn pairing_state(record: &PairingRecord, week: u32) -> PairingState {
    if let Some(pending) = record.in_week(week).find(|p| !p.confirmed) {
        return PairingState::PendingReveal(pending.partner.clone());
    }
    match record.in_week(week).filter(|p| p.confirmed).last() {
        Some(confirmed) => PairingState::Confirmed(confirmed.partner.clone()),
        None => PairingState::NoPartnerYet,
    }
}

/// A pending reveal pins the wheel to that partner; otherwise everyone on the
/// roster not yet partnered, in roster order.
pub fn available_partners(record: &PairingRecord, roster: &Roster, week: u32) -> Vec<String> {
    if let PairingState::PendingReveal(partner) = pairing_state(record, week) {
        return vec![partner];
    }
    roster
        .names()
        .iter()
        .filter(|name| **name != record.name && !record.has_partnered(name))
        .cloned()
        .collect()
}

fn first_pending_week(record: &PairingRecord) -> Option<u32> {
    record
        .partnerships
        .iter()
        .filter(|p| !p.confirmed)
        .map(|p| p.week)
        .min()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    const KEY: &str = "partnerPickerData";

    fn context() -> PairingContext<MemoryStore> {
        context_with(&["Alice", "Bob", "Carol"])
    }

    fn context_with(names: &[&str]) -> PairingContext<MemoryStore> {
        let roster = Roster::from_names(names).unwrap();
        PairingContext::load(roster, PairingStore::new(MemoryStore::default(), KEY))
    }

    fn entry(week: u32, partner: &str, confirmed: bool) -> Partnership {
        Partnership {
            week,
            partner: partner.to_owned(),
            confirmed,
        }
    }

    fn login(ctx: &mut PairingContext<MemoryStore>, name: &str) -> Session {
        let mut session = Session::new();
        session.submit_name(ctx, name).unwrap();
        session
    }

    #[test]
    fn submit_name_canonicalizes_and_creates_record() {
        let mut ctx = context();
        let mut session = Session::new();
        assert_eq!(session.submit_name(&mut ctx, " aLiCe "), Ok("Alice".to_owned()));
        assert_eq!(session.active_user(), Some("Alice"));
        assert_eq!(ctx.book().get("Alice"), Some(&PairingRecord::new("Alice")));
        assert!(ctx.store().backend().raw(KEY).is_some());
    }

    #[test]
    fn unknown_name_leaves_state_untouched() {
        let mut ctx = context();
        let mut session = login(&mut ctx, "Alice");
        assert_eq!(
            session.submit_name(&mut ctx, "Mallory"),
            Err(SessionError::NameNotFound("Mallory".to_owned()))
        );
        assert_eq!(session.active_user(), Some("Alice"));
        assert_eq!(ctx.book().len(), 1);
    }

    #[test]
    fn operations_require_login() {
        let mut ctx = context();
        let mut session = Session::new();
        assert_eq!(session.available_partners(&ctx), Err(SessionError::NoActiveUser));
        assert_eq!(session.state(&ctx), Err(SessionError::NoActiveUser));
        assert_eq!(
            session.resolve_spin(&mut ctx, "Bob"),
            Err(SessionError::NoActiveUser)
        );
        assert_eq!(session.start_new_week(&ctx), Err(SessionError::NoActiveUser));
        assert!(session.history(&ctx).is_empty());
    }

    #[test]
    fn reveal_flow_for_three_participants() {
        let mut ctx = context();
        let mut alice = login(&mut ctx, "alice");
        assert_eq!(alice.state(&ctx), Ok(PairingState::NoPartnerYet));
        assert_eq!(
            alice.available_partners(&ctx),
            Ok(vec!["Bob".to_owned(), "Carol".to_owned()])
        );

        let outcome = alice.resolve_spin(&mut ctx, "Bob").unwrap();
        assert_eq!(outcome.kind, SpinKind::Created);
        assert_eq!(outcome.week, 1);
        assert_eq!(outcome.persist_error, None);
        assert_eq!(alice.displayed_partner(), Some("Bob"));
        assert_eq!(alice.state(&ctx), Ok(PairingState::Confirmed("Bob".to_owned())));

        let alice_record = ctx.book().get("Alice").unwrap();
        assert_eq!(alice_record.partnerships, vec![entry(1, "Bob", true)]);
        assert_eq!(alice_record.current_week, 2);
        let bob_record = ctx.book().get("Bob").unwrap();
        assert_eq!(bob_record.partnerships, vec![entry(1, "Alice", false)]);
        let bob_week_before = bob_record.current_week;

        alice.reset();
        let mut bob = login(&mut ctx, "BOB");
        assert_eq!(
            bob.state(&ctx),
            Ok(PairingState::PendingReveal("Alice".to_owned()))
        );
        assert_eq!(bob.available_partners(&ctx), Ok(vec!["Alice".to_owned()]));
        assert_eq!(bob.displayed_partner(), None);

        let reveal = bob.resolve_spin(&mut ctx, "Alice").unwrap();
        assert_eq!(reveal.kind, SpinKind::Revealed);
        assert_eq!(reveal.week, 1);
        let bob_record = ctx.book().get("Bob").unwrap();
        assert_eq!(bob_record.partnerships, vec![entry(1, "Alice", true)]);
        assert_eq!(bob_record.current_week, bob_week_before);
        assert_eq!(
            ctx.book().get("Alice").unwrap().partnerships,
            vec![entry(1, "Bob", true)]
        );
        assert_eq!(bob.state(&ctx), Ok(PairingState::Confirmed("Alice".to_owned())));
    }

    #[test]
    fn fresh_match_is_symmetric() {
        let mut ctx = context();
        let mut carol = login(&mut ctx, "Carol");
        let outcome = carol.resolve_spin(&mut ctx, "Alice").unwrap();

        let carol_side = &ctx.book().get("Carol").unwrap().partnerships[0];
        let alice_side = &ctx.book().get("Alice").unwrap().partnerships[0];
        assert_eq!(carol_side.week, outcome.week);
        assert_eq!(alice_side.week, outcome.week);
        assert_eq!(carol_side.partner, "Alice");
        assert_eq!(alice_side.partner, "Carol");
        assert!(carol_side.confirmed);
        assert!(!alice_side.confirmed);
        assert_eq!(ctx.book().get("Alice").unwrap().current_week, 2);
    }

    #[test]
    fn past_partners_stay_excluded_in_later_weeks() {
        let mut ctx = context();
        let mut alice = login(&mut ctx, "Alice");
        alice.resolve_spin(&mut ctx, "Bob").unwrap();
        alice.start_new_week(&ctx).unwrap();
        assert_eq!(alice.displayed_partner(), None);
        assert_eq!(alice.active_week(), Some(2));
        assert_eq!(alice.state(&ctx), Ok(PairingState::NoPartnerYet));
        assert_eq!(alice.available_partners(&ctx), Ok(vec!["Carol".to_owned()]));

        alice.reset();
        let alice = login(&mut ctx, "Alice");
        assert_eq!(alice.displayed_partner(), Some("Bob"));
        assert_eq!(alice.available_partners(&ctx), Ok(vec!["Carol".to_owned()]));
    }

    #[test]
    fn start_new_week_keeps_week_counter() {
        let mut ctx = context();
        let mut alice = login(&mut ctx, "Alice");
        alice.resolve_spin(&mut ctx, "Bob").unwrap();
        alice.start_new_week(&ctx).unwrap();
        alice.start_new_week(&ctx).unwrap();
        assert_eq!(ctx.book().get("Alice").unwrap().current_week, 2);
    }

    #[test]
    fn candidates_never_include_self_or_past_partners() {
        let mut ctx = context();
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        for name in ["Alice", "Bob", "Carol"] {
            let mut session = login(&mut ctx, name);
            while let Ok(candidates) = session.available_partners(&ctx) {
                let record = session.active_record(&ctx).unwrap();
                assert!(!candidates.contains(&record.name));
                if !matches!(session.state(&ctx), Ok(PairingState::PendingReveal(_))) {
                    assert!(candidates.iter().all(|c| !record.has_partnered(c)));
                }
                if candidates.is_empty() {
                    break;
                }
                session.spin(&mut ctx, &mut rng).unwrap();
                session.start_new_week(&ctx).unwrap();
            }
        }
        for record in ctx.book().records() {
            assert_eq!(record.partnerships.len(), 2, "{}", record.name);
            assert!(record.partnerships.iter().all(|p| p.confirmed));
        }
    }

    #[test]
    fn available_partners_is_idempotent() {
        let mut ctx = context();
        let mut alice = login(&mut ctx, "Alice");
        alice.resolve_spin(&mut ctx, "Carol").unwrap();
        let first = alice.available_partners(&ctx);
        assert_eq!(alice.available_partners(&ctx), first);
        assert_eq!(alice.available_partners(&ctx), first);
    }

    #[test]
    fn exhausted_roster_refuses_to_spin() {
        let mut ctx = context();
        let mut alice = login(&mut ctx, "Alice");
        alice.resolve_spin(&mut ctx, "Bob").unwrap();
        alice.start_new_week(&ctx).unwrap();
        alice.resolve_spin(&mut ctx, "Carol").unwrap();
        alice.start_new_week(&ctx).unwrap();

        assert_eq!(alice.available_partners(&ctx), Ok(Vec::new()));
        let mut rng = ChaCha8Rng::seed_from_u64(5);
        assert_eq!(
            alice.spin(&mut ctx, &mut rng),
            Err(SessionError::EmptyCandidateList)
        );
        assert_eq!(ctx.book().get("Alice").unwrap().current_week, 3);
    }

    #[test]
    fn spin_onto_unavailable_partner_is_rejected() {
        let mut ctx = context();
        let mut alice = login(&mut ctx, "Alice");
        assert_eq!(
            alice.resolve_spin(&mut ctx, "Alice"),
            Err(SessionError::PartnerUnavailable("Alice".to_owned()))
        );
        alice.resolve_spin(&mut ctx, "Bob").unwrap();
        assert_eq!(
            alice.resolve_spin(&mut ctx, "Bob"),
            Err(SessionError::PartnerUnavailable("Bob".to_owned()))
        );
        assert_eq!(ctx.book().get("Bob").unwrap().partnerships.len(), 1);
    }

    #[test]
    fn pending_reveal_pins_the_wheel() {
        let mut ctx = context();
        let mut bob = login(&mut ctx, "Bob");
        bob.resolve_spin(&mut ctx, "Carol").unwrap();

        let mut carol = login(&mut ctx, "Carol");
        let mut rng = ChaCha8Rng::seed_from_u64(99);
        let outcome = carol.spin(&mut ctx, &mut rng).unwrap();
        assert_eq!(outcome.kind, SpinKind::Revealed);
        assert_eq!(outcome.partner, "Bob");
    }

    #[test]
    fn passive_match_pushes_partner_week_forward() {
        let mut ctx = context();
        let mut alice = login(&mut ctx, "Alice");
        alice.resolve_spin(&mut ctx, "Bob").unwrap();
        alice.start_new_week(&ctx).unwrap();
        alice.resolve_spin(&mut ctx, "Carol").unwrap();

        let carol = ctx.book().get("Carol").unwrap();
        assert_eq!(carol.partnerships, vec![entry(2, "Alice", false)]);
        assert_eq!(carol.current_week, 3);

        let carol_session = login(&mut ctx, "Carol");
        assert_eq!(carol_session.active_week(), Some(2));
        assert_eq!(
            carol_session.state(&ctx),
            Ok(PairingState::PendingReveal("Alice".to_owned()))
        );
    }

    #[test]
    fn failed_write_keeps_both_sides_and_retries() {
        let mut ctx = context();
        let mut alice = login(&mut ctx, "Alice");
        ctx.store_mut().backend_mut().set_reject_writes(true);

        let outcome = alice.resolve_spin(&mut ctx, "Bob").unwrap();
        assert!(matches!(outcome.persist_error, Some(StoreError::WriteFailed(_))));
        assert_eq!(ctx.book().get("Bob").unwrap().partnerships.len(), 1);
        assert!(ctx.store().load().get("Bob").is_none());

        ctx.store_mut().backend_mut().set_reject_writes(false);
        alice.start_new_week(&ctx).unwrap();
        alice.resolve_spin(&mut ctx, "Carol").unwrap();

        let persisted = ctx.store().load();
        assert_eq!(persisted.get("Alice").unwrap().partnerships.len(), 2);
        assert_eq!(persisted.get("Bob").unwrap().partnerships.len(), 1);
        assert_eq!(persisted.get("Carol").unwrap().partnerships.len(), 1);
    }

    #[test]
    fn state_survives_reload() {
        let mut ctx = context();
        let mut alice = login(&mut ctx, "Alice");
        alice.resolve_spin(&mut ctx, "Bob").unwrap();

        let store = ctx.store().clone();
        let mut reloaded = PairingContext::load(ctx.roster().clone(), store);
        assert_eq!(reloaded.book(), ctx.book());
        let bob = login(&mut reloaded, "Bob");
        assert_eq!(bob.available_partners(&reloaded), Ok(vec!["Alice".to_owned()]));
    }

    #[test]
    fn logout_leaves_book_untouched() {
        let mut ctx = context();
        let mut alice = login(&mut ctx, "Alice");
        alice.resolve_spin(&mut ctx, "Bob").unwrap();
        let before = ctx.book().clone();
        alice.reset();
        assert_eq!(alice.active_user(), None);
        assert_eq!(alice.displayed_partner(), None);
        assert_eq!(ctx.book(), &before);
    }

    #[test]
    fn wheel_spin_commits_before_user_switch() {
        let mut ctx = context();
        let mut session = login(&mut ctx, "Alice");
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        let result = session.spin_wheel(&mut ctx, 0.0, 4..=8, &mut rng).unwrap();
        assert_eq!(result.names, vec!["Bob".to_owned(), "Carol".to_owned()]);
        assert_eq!(result.names[result.spin.index], result.outcome.partner);
        let partner = result.outcome.partner.clone();

        // Switching users mid-animation must not move the match.
        session.reset();
        session.submit_name(&mut ctx, "Carol").unwrap();

        let alice = ctx.book().get("Alice").unwrap();
        assert_eq!(alice.partnerships, vec![entry(1, &partner, true)]);
        let carol = ctx.book().get("Carol").unwrap();
        assert!(carol.partnerships.iter().all(|p| !p.confirmed || p.partner != partner));
        assert!(ctx.store().load().get("Alice").unwrap().has_partnered(&partner));
    }

    #[test]
    fn wheel_spin_refuses_empty_wheel() {
        let mut ctx = context();
        let mut alice = login(&mut ctx, "Alice");
        alice.resolve_spin(&mut ctx, "Bob").unwrap();
        alice.start_new_week(&ctx).unwrap();
        alice.resolve_spin(&mut ctx, "Carol").unwrap();
        alice.start_new_week(&ctx).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(21);
        assert_eq!(
            alice.spin_wheel(&mut ctx, 0.0, 4..=8, &mut rng),
            Err(SessionError::EmptyCandidateList)
        );
    }

    #[test]
    fn two_pending_reveals_in_one_week() {
        let mut ctx = context();
        login(&mut ctx, "Alice").resolve_spin(&mut ctx, "Bob").unwrap();
        login(&mut ctx, "Carol").resolve_spin(&mut ctx, "Bob").unwrap();

        let mut bob = login(&mut ctx, "Bob");
        assert_eq!(bob.active_week(), Some(1));
        assert_eq!(bob.state(&ctx), Ok(PairingState::PendingReveal("Alice".to_owned())));
        assert_eq!(bob.available_partners(&ctx), Ok(vec!["Alice".to_owned()]));

        bob.resolve_spin(&mut ctx, "Alice").unwrap();
        // The second reveal is due at once; the card keeps showing Alice.
        assert_eq!(bob.displayed_partner(), Some("Alice"));
        assert_eq!(bob.state(&ctx), Ok(PairingState::PendingReveal("Carol".to_owned())));
        assert_eq!(bob.available_partners(&ctx), Ok(vec!["Carol".to_owned()]));

        bob.start_new_week(&ctx).unwrap();
        assert_eq!(bob.active_week(), Some(1));
        assert_eq!(bob.displayed_partner(), None);
        assert_eq!(bob.state(&ctx), Ok(PairingState::PendingReveal("Carol".to_owned())));

        let reveal = bob.resolve_spin(&mut ctx, "Carol").unwrap();
        assert_eq!(reveal.kind, SpinKind::Revealed);
        assert_eq!(bob.displayed_partner(), Some("Carol"));
        assert_eq!(bob.state(&ctx), Ok(PairingState::Confirmed("Carol".to_owned())));
        assert_eq!(bob.available_partners(&ctx), Ok(Vec::new()));
        assert_eq!(
            ctx.book().get("Bob").unwrap().partnerships,
            vec![entry(1, "Alice", true), entry(1, "Carol", true)]
        );
    }

    #[test]
    fn stale_pending_week_surfaces_first() {
        let mut ctx = context_with(&["Alice", "Bob", "Carol", "Dave"]);
        login(&mut ctx, "Alice").resolve_spin(&mut ctx, "Bob").unwrap();
        let mut carol = login(&mut ctx, "Carol");
        carol.resolve_spin(&mut ctx, "Dave").unwrap();
        carol.start_new_week(&ctx).unwrap();
        carol.resolve_spin(&mut ctx, "Bob").unwrap();

        let bob_record = ctx.book().get("Bob").unwrap();
        assert_eq!(bob_record.current_week, 3);
        assert_eq!(
            bob_record.partnerships,
            vec![entry(1, "Alice", false), entry(2, "Carol", false)]
        );

        let mut bob = login(&mut ctx, "Bob");
        assert_eq!(bob.active_week(), Some(1));
        assert_eq!(bob.available_partners(&ctx), Ok(vec!["Alice".to_owned()]));
        bob.resolve_spin(&mut ctx, "Alice").unwrap();
        assert_eq!(bob.state(&ctx), Ok(PairingState::Confirmed("Alice".to_owned())));

        bob.start_new_week(&ctx).unwrap();
        assert_eq!(bob.active_week(), Some(2));
        assert_eq!(bob.available_partners(&ctx), Ok(vec!["Carol".to_owned()]));
        bob.resolve_spin(&mut ctx, "Carol").unwrap();

        bob.start_new_week(&ctx).unwrap();
        assert_eq!(bob.active_week(), Some(3));
        assert_eq!(bob.state(&ctx), Ok(PairingState::NoPartnerYet));
        assert_eq!(bob.available_partners(&ctx), Ok(vec!["Dave".to_owned()]));
        assert_eq!(ctx.book().get("Bob").unwrap().current_week, 3);
    }

    #[test]
    fn login_with_rejected_write_keeps_record_in_memory() {
        let mut ctx = context();
        ctx.store_mut().backend_mut().set_reject_writes(true);
        let alice = login(&mut ctx, "Alice");
        assert_eq!(alice.active_user(), Some("Alice"));
        assert_eq!(ctx.book().get("Alice"), Some(&PairingRecord::new("Alice")));
        assert!(ctx.store().backend().raw(KEY).is_none());
    }
}
