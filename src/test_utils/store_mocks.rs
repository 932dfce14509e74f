//! In-memory implementation of every repository trait.
//!
//! All tables live behind one mutex. Each mutating call works on a copy of
//! the state and swaps it in only on success, which gives the same rollback
//! behaviour as a database transaction. Unique constraints are emulated.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use uuid::Uuid;

use crate::{
    app_error::{AppError, AppResult},
    application::use_cases::{
        habit_lock::HabitLockRepo,
        payment::{
            CompletePaymentInput, CompletionOutcome, CreatePaymentInput, PaymentRecord, PaymentRepo,
        },
        promo::{CreatePromoInput, PromoCodeRepo},
        subscription::{ActivationInput, ExpireOutcome, SubscriptionRepo},
    },
    domain::entities::{
        habit::{HabitLockState, HabitLockUpdate, LockReason, select_habits_to_lock},
        payment_status::PaymentStatus,
        promo_code::{PromoCode, PromoUse},
        subscription::{Subscription, SubscriptionAction, SubscriptionHistoryEntry},
        user::{EntitlementUpdate, UserEntitlement, UserId},
    },
};

#[derive(Default, Clone)]
struct StoreState {
    users: HashMap<UserId, UserEntitlement>,
    subscriptions: Vec<Subscription>,
    history: Vec<SubscriptionHistoryEntry>,
    payments: Vec<PaymentRecord>,
    promos: Vec<PromoCode>,
    promo_uses: Vec<PromoUse>,
    habits: Vec<HabitLockState>,
}

impl StoreState {
    fn is_premium(&self, user_id: UserId) -> bool {
        self.users.get(&user_id).is_some_and(|u| u.is_premium)
    }

    fn has_active(&self, user_id: UserId) -> bool {
        self.subscriptions
            .iter()
            .any(|s| s.user_id == user_id && s.active)
    }

    fn set_entitlement(&mut self, user_id: UserId, update: EntitlementUpdate) {
        self.users.insert(
            user_id,
            UserEntitlement {
                user_id,
                is_premium: update.is_premium,
                plan_type: update.plan_type,
                expires_at: update.expires_at,
            },
        );
    }

    fn push_history(
        &mut self,
        subscription: &Subscription,
        action: SubscriptionAction,
        now: DateTime<Utc>,
    ) {
        let id = self.history.len() as i64 + 1;
        self.history.push(SubscriptionHistoryEntry {
            id,
            user_id: subscription.user_id,
            subscription_id: subscription.id,
            action,
            plan_type: subscription.plan_type.clone(),
            created_at: now,
        });
    }

    fn activate(&mut self, input: &ActivationInput) -> AppResult<Subscription> {
        let now = input.started_at;

        let mut superseded = Vec::new();
        for sub in self
            .subscriptions
            .iter_mut()
            .filter(|s| s.user_id == input.user_id && s.active)
        {
            sub.active = false;
            sub.cancelled_at = Some(now);
            superseded.push(sub.clone());
        }
        for sub in &superseded {
            self.push_history(sub, SubscriptionAction::Superseded, now);
        }

        let subscription = Subscription {
            id: Uuid::new_v4(),
            user_id: input.user_id,
            plan_type: input.plan_type.clone(),
            plan_name: input.plan_name.clone(),
            price_units: input.price_units,
            started_at: now,
            expires_at: input.expires_at,
            active: true,
            trial: input.trial,
            payment_reference: input.payment_reference.clone(),
            cancelled_at: None,
            created_at: now,
        };
        self.subscriptions.push(subscription.clone());
        self.set_entitlement(
            input.user_id,
            EntitlementUpdate::premium(&input.plan_type, input.expires_at),
        );
        self.push_history(&subscription, input.action, now);
        Ok(subscription)
    }
}

#[derive(Default)]
struct Faults {
    unavailable: bool,
    fail_completion: bool,
    hide_charge_lookups: bool,
    fail_expire: HashSet<Uuid>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    faults: Mutex<Faults>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_available(&self) -> AppResult<()> {
        if self.faults.lock().unwrap().unavailable {
            return Err(AppError::StoreUnavailable);
        }
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&StoreState) -> T) -> AppResult<T> {
        self.check_available()?;
        Ok(f(&self.state.lock().unwrap()))
    }

    /// Runs `f` against a copy of the state, committing only on `Ok`.
    fn transaction<T>(&self, f: impl FnOnce(&mut StoreState) -> AppResult<T>) -> AppResult<T> {
        self.check_available()?;
        let mut state = self.state.lock().unwrap();
        let mut draft = state.clone();
        let out = f(&mut draft)?;
        *state = draft;
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // Fault injection
    // ------------------------------------------------------------------------

    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.lock().unwrap().unavailable = unavailable;
    }

    pub fn fail_completion(&self, fail: bool) {
        self.faults.lock().unwrap().fail_completion = fail;
    }

    /// Makes `get_by_charge_id` miss, as a concurrent delivery would.
    pub fn hide_charge_lookups(&self, hide: bool) {
        self.faults.lock().unwrap().hide_charge_lookups = hide;
    }

    pub fn fail_expire_for(&self, subscription_id: Uuid) {
        self.faults
            .lock()
            .unwrap()
            .fail_expire
            .insert(subscription_id);
    }

    // ------------------------------------------------------------------------
    // Seeding and inspection
    // ------------------------------------------------------------------------

    pub fn set_entitlement(&self, entitlement: UserEntitlement) {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(entitlement.user_id, entitlement);
    }

    pub fn entitlement(&self, user_id: UserId) -> Option<UserEntitlement> {
        self.state.lock().unwrap().users.get(&user_id).cloned()
    }

    pub fn add_subscription(&self, subscription: Subscription) {
        self.state.lock().unwrap().subscriptions.push(subscription);
    }

    pub fn subscription(&self, id: Uuid) -> Option<Subscription> {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .find(|s| s.id == id)
            .cloned()
    }

    pub fn subscriptions_of(&self, user_id: UserId) -> Vec<Subscription> {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn payment_by_token(&self, token: &str) -> Option<PaymentRecord> {
        self.state
            .lock()
            .unwrap()
            .payments
            .iter()
            .find(|p| p.token == token)
            .cloned()
    }

    pub fn add_promo(&self, promo: PromoCode) {
        self.state.lock().unwrap().promos.push(promo);
    }

    pub fn promo_by_code(&self, code: &str) -> Option<PromoCode> {
        self.state
            .lock()
            .unwrap()
            .promos
            .iter()
            .find(|p| p.code == code)
            .cloned()
    }

    pub fn add_promo_use(&self, promo_use: PromoUse) {
        self.state.lock().unwrap().promo_uses.push(promo_use);
    }

    pub fn promo_uses(&self) -> Vec<PromoUse> {
        self.state.lock().unwrap().promo_uses.clone()
    }

    pub fn add_habit(&self, habit: HabitLockState) {
        self.state.lock().unwrap().habits.push(habit);
    }

    pub fn habit_count(&self) -> usize {
        self.state.lock().unwrap().habits.len()
    }

    pub fn habit(&self, id: Uuid) -> Option<HabitLockState> {
        self.state
            .lock()
            .unwrap()
            .habits
            .iter()
            .find(|h| h.id == id)
            .cloned()
    }

    pub fn habits_of(&self, owner_id: UserId) -> Vec<HabitLockState> {
        self.state
            .lock()
            .unwrap()
            .habits
            .iter()
            .filter(|h| h.owner_id == owner_id)
            .cloned()
            .collect()
    }
}

// ============================================================================
// SubscriptionRepo
// ============================================================================

#[async_trait]
impl SubscriptionRepo for InMemoryStore {
    async fn activate(&self, input: &ActivationInput) -> AppResult<Subscription> {
        self.transaction(|s| s.activate(input))
    }

    async fn cancel_active(
        &self,
        user_id: UserId,
        now: DateTime<Utc>,
    ) -> AppResult<Option<Subscription>> {
        self.transaction(|s| {
            let Some(sub) = s
                .subscriptions
                .iter_mut()
                .find(|sub| sub.user_id == user_id && sub.active)
            else {
                return Ok(None);
            };
            sub.active = false;
            sub.cancelled_at = Some(now);
            let cancelled = sub.clone();

            s.set_entitlement(user_id, EntitlementUpdate::revoked());
            s.push_history(&cancelled, SubscriptionAction::Cancelled, now);
            Ok(Some(cancelled))
        })
    }

    async fn get_active(&self, user_id: UserId) -> AppResult<Option<Subscription>> {
        self.read(|s| {
            s.subscriptions
                .iter()
                .find(|sub| sub.user_id == user_id && sub.active)
                .cloned()
        })
    }

    async fn list_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<Subscription>> {
        self.read(|s| {
            s.subscriptions
                .iter()
                .filter(|sub| sub.is_overdue(now))
                .cloned()
                .collect()
        })
    }

    async fn expire(
        &self,
        subscription_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Option<ExpireOutcome>> {
        if self
            .faults
            .lock()
            .unwrap()
            .fail_expire
            .contains(&subscription_id)
        {
            return Err(AppError::StoreUnavailable);
        }

        self.transaction(|s| {
            let Some(sub) = s
                .subscriptions
                .iter_mut()
                .find(|sub| sub.id == subscription_id)
            else {
                return Ok(None);
            };

            if !sub.is_overdue(now) {
                return Ok(Some(ExpireOutcome {
                    subscription: sub.clone(),
                    deactivated: false,
                    downgraded: false,
                }));
            }

            sub.active = false;
            let expired = sub.clone();

            let downgraded = !s.has_active(expired.user_id);
            if downgraded {
                s.set_entitlement(expired.user_id, EntitlementUpdate::revoked());
            }

            let already_logged = s.history.iter().any(|h| {
                h.subscription_id == subscription_id && h.action == SubscriptionAction::Expired
            });
            if !already_logged {
                s.push_history(&expired, SubscriptionAction::Expired, now);
            }

            Ok(Some(ExpireOutcome {
                subscription: expired,
                deactivated: true,
                downgraded,
            }))
        })
    }

    async fn list_history(&self, user_id: UserId) -> AppResult<Vec<SubscriptionHistoryEntry>> {
        self.read(|s| {
            s.history
                .iter()
                .rev()
                .filter(|h| h.user_id == user_id)
                .cloned()
                .collect()
        })
    }

    async fn get_entitlement(&self, user_id: UserId) -> AppResult<Option<UserEntitlement>> {
        self.read(|s| s.users.get(&user_id).cloned())
    }
}

// ============================================================================
// PaymentRepo
// ============================================================================

fn new_payment(input: &CreatePaymentInput, status: PaymentStatus) -> PaymentRecord {
    PaymentRecord {
        id: Uuid::new_v4(),
        user_id: input.user_id,
        token: input.token.clone(),
        gateway_charge_id: None,
        provider_charge_id: None,
        amount: input.amount,
        paid_amount: None,
        currency: None,
        plan_type: input.plan_type.clone(),
        promo_code_id: input.promo_code_id,
        discount_applied: input.discount_applied,
        status,
        created_at: Utc::now(),
        processed_at: None,
    }
}

#[async_trait]
impl PaymentRepo for InMemoryStore {
    async fn create_pending(&self, input: &CreatePaymentInput) -> AppResult<PaymentRecord> {
        self.transaction(|s| {
            if let Some(existing) = s.payments.iter().find(|p| p.token == input.token) {
                return Ok(existing.clone());
            }
            let record = new_payment(input, PaymentStatus::Pending);
            s.payments.push(record.clone());
            Ok(record)
        })
    }

    async fn get_by_token(&self, token: &str) -> AppResult<Option<PaymentRecord>> {
        self.read(|s| s.payments.iter().find(|p| p.token == token).cloned())
    }

    async fn get_by_charge_id(&self, gateway_charge_id: &str) -> AppResult<Option<PaymentRecord>> {
        if self.faults.lock().unwrap().hide_charge_lookups {
            return Ok(None);
        }
        self.read(|s| {
            s.payments
                .iter()
                .find(|p| p.gateway_charge_id.as_deref() == Some(gateway_charge_id))
                .cloned()
        })
    }

    async fn mark_processing(&self, input: &CreatePaymentInput) -> AppResult<PaymentRecord> {
        self.transaction(|s| {
            match s.payments.iter_mut().find(|p| p.token == input.token) {
                Some(existing) => {
                    if existing.status.can_transition_to(PaymentStatus::Processing) {
                        existing.status = PaymentStatus::Processing;
                    }
                    Ok(existing.clone())
                }
                None => {
                    let record = new_payment(input, PaymentStatus::Processing);
                    s.payments.push(record.clone());
                    Ok(record)
                }
            }
        })
    }

    async fn complete(&self, input: &CompletePaymentInput) -> AppResult<CompletionOutcome> {
        if self.faults.lock().unwrap().fail_completion {
            return Err(AppError::StoreUnavailable);
        }

        self.transaction(|s| {
            let charge_taken = s.payments.iter().any(|p| {
                p.gateway_charge_id.as_deref() == Some(input.gateway_charge_id.as_str())
                    && p.token != input.token
            });
            if charge_taken {
                return Ok(CompletionOutcome::Duplicate);
            }

            let user_id = input.activation.user_id;
            let now = input.activation.started_at;
            let position = s.payments.iter().position(|p| p.token == input.token);
            let record = match position {
                Some(pos) if !s.payments[pos].status.can_transition_to(PaymentStatus::Completed) => {
                    return Ok(CompletionOutcome::Duplicate);
                }
                Some(pos) => &mut s.payments[pos],
                None => {
                    s.payments.push(PaymentRecord {
                        id: Uuid::new_v4(),
                        user_id,
                        token: input.token.clone(),
                        gateway_charge_id: None,
                        provider_charge_id: None,
                        amount: input.paid_amount,
                        paid_amount: None,
                        currency: None,
                        plan_type: input.activation.plan_type.clone(),
                        promo_code_id: None,
                        discount_applied: 0,
                        status: PaymentStatus::Processing,
                        created_at: now,
                        processed_at: None,
                    });
                    s.payments.last_mut().ok_or(AppError::StoreUnavailable)?
                }
            };
            record.status = PaymentStatus::Completed;
            record.gateway_charge_id = Some(input.gateway_charge_id.clone());
            record.provider_charge_id = Some(input.provider_charge_id.clone());
            record.paid_amount = Some(input.paid_amount);
            record.currency = Some(input.currency.clone());
            record.processed_at = Some(now);
            let promo_id = record.promo_code_id;
            let discount_applied = record.discount_applied;

            let mut activation = input.activation.clone();
            let mut promo_applied = false;
            if let Some(promo_id) = promo_id {
                let already_used = s
                    .promo_uses
                    .iter()
                    .any(|u| u.promo_id == promo_id && u.user_id == user_id);
                let promo = s
                    .promos
                    .iter_mut()
                    .find(|p| p.id == promo_id && !p.is_exhausted());
                if let (false, Some(promo)) = (already_used, promo) {
                    promo.used_count += 1;
                    promo_applied = true;
                    if let (Some(days), Some(expires_at)) = (promo.bonus_days, activation.expires_at) {
                        activation.expires_at = Some(expires_at + Duration::days(i64::from(days)));
                    }
                }
            }

            let subscription = s.activate(&activation)?;
            if promo_applied {
                if let Some(promo_id) = promo_id {
                    s.promo_uses.push(PromoUse {
                        id: Uuid::new_v4(),
                        promo_id,
                        user_id,
                        subscription_id: subscription.id,
                        discount_applied,
                        created_at: now,
                    });
                }
            }

            Ok(CompletionOutcome::Completed {
                subscription,
                promo_applied,
            })
        })
    }
}

// ============================================================================
// PromoCodeRepo
// ============================================================================

#[async_trait]
impl PromoCodeRepo for InMemoryStore {
    async fn get_by_code(&self, code: &str) -> AppResult<Option<PromoCode>> {
        self.read(|s| s.promos.iter().find(|p| p.code == code).cloned())
    }

    async fn has_use(&self, promo_id: Uuid, user_id: UserId) -> AppResult<bool> {
        self.read(|s| {
            s.promo_uses
                .iter()
                .any(|u| u.promo_id == promo_id && u.user_id == user_id)
        })
    }

    async fn create(&self, input: &CreatePromoInput) -> AppResult<PromoCode> {
        self.transaction(|s| {
            if s.promos.iter().any(|p| p.code == input.code) {
                return Err(AppError::InvalidInput(
                    "A record with this value already exists".into(),
                ));
            }
            let promo = PromoCode {
                id: Uuid::new_v4(),
                code: input.code.clone(),
                discount_percent: input.discount_percent,
                discount_stars: input.discount_stars,
                bonus_days: input.bonus_days,
                max_uses: input.max_uses,
                used_count: 0,
                valid_from: input.valid_from,
                valid_until: input.valid_until,
                is_active: true,
                applicable_plans: input.applicable_plans.clone(),
                created_at: Utc::now(),
            };
            s.promos.push(promo.clone());
            Ok(promo)
        })
    }
}

// ============================================================================
// HabitLockRepo
// ============================================================================

#[async_trait]
impl HabitLockRepo for InMemoryStore {
    async fn lock_over_quota(
        &self,
        user_id: UserId,
        quota: usize,
        reason: LockReason,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<Uuid>> {
        self.transaction(|s| {
            if s.is_premium(user_id) {
                return Ok(Vec::new());
            }
            let owned: Vec<HabitLockState> = s
                .habits
                .iter()
                .filter(|h| h.owner_id == user_id)
                .cloned()
                .collect();
            let to_lock = select_habits_to_lock(&owned, quota);
            for habit in s.habits.iter_mut().filter(|h| to_lock.contains(&h.id)) {
                habit.apply(HabitLockUpdate::lock(now, reason));
            }
            Ok(to_lock)
        })
    }

    async fn unlock_all(&self, user_id: UserId) -> AppResult<u64> {
        self.transaction(|s| {
            if !s.is_premium(user_id) {
                return Ok(0);
            }
            let mut count = 0;
            for habit in s
                .habits
                .iter_mut()
                .filter(|h| h.owner_id == user_id && h.is_locked())
            {
                habit.apply(HabitLockUpdate::unlock());
                count += 1;
            }
            Ok(count)
        })
    }

    async fn mark_premium_tier_if_over_quota(
        &self,
        user_id: UserId,
        habit_id: Uuid,
        quota: usize,
    ) -> AppResult<bool> {
        self.transaction(|s| {
            if !s.is_premium(user_id) {
                return Ok(false);
            }
            let active = s
                .habits
                .iter()
                .filter(|h| h.owner_id == user_id && h.is_active)
                .count();
            if active <= quota {
                return Ok(false);
            }
            match s
                .habits
                .iter_mut()
                .find(|h| h.id == habit_id && h.owner_id == user_id)
            {
                Some(habit) => {
                    habit.is_premium_tier = true;
                    Ok(true)
                }
                None => Ok(false),
            }
        })
    }

    async fn list_locked(&self, user_id: UserId) -> AppResult<Vec<HabitLockState>> {
        self.read(|s| {
            let mut locked: Vec<HabitLockState> = s
                .habits
                .iter()
                .filter(|h| h.owner_id == user_id && h.is_locked())
                .cloned()
                .collect();
            locked.sort_by_key(|h| h.created_at);
            locked
        })
    }
}
