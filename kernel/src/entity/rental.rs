mod id;
mod item;
mod late_fee;
mod status;
mod transition;

pub use self::{id::*, item::*, late_fee::*, status::*, transition::*};

use destructure::{Destructure, Mutation};
use error_stack::Report;
use serde::{Deserialize, Serialize};
use time::{Date, Duration};
use vodca::References;

use crate::config::RentalPolicy;
use crate::entity::{ItemId, ItemInfo, UserId, Version};
use crate::event::RentalNotification;
use crate::{BlockReason, KernelError};

/// The loan record of a single user. All state changes go through the
/// transition methods below, which never touch `self` and never perform I/O.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize, References, Destructure, Mutation)]
pub struct Rental {
    id: RentalId,
    user_id: UserId,
    status: RentalStatus,
    late_fee: LateFee,
    rented_items: Vec<RentedItem>,
    overdue_items: Vec<OverdueItem>,
    returned_items: Vec<ReturnedItem>,
    version: Version<Rental>,
}

impl Rental {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: RentalId,
        user_id: UserId,
        status: RentalStatus,
        late_fee: LateFee,
        rented_items: Vec<RentedItem>,
        overdue_items: Vec<OverdueItem>,
        returned_items: Vec<ReturnedItem>,
        version: Version<Rental>,
    ) -> Self {
        Self {
            id,
            user_id,
            status,
            late_fee,
            rented_items,
            overdue_items,
            returned_items,
            version,
        }
    }

    /// A fresh record for a newly provisioned user.
    pub fn provision(id: RentalId, user_id: UserId) -> Self {
        Self::new(
            id,
            user_id,
            RentalStatus::Available,
            LateFee::default(),
            Vec::new(),
            Vec::new(),
            Vec::new(),
            Version::initial(),
        )
    }

    pub fn held_count(&self) -> usize {
        self.rented_items.len() + self.overdue_items.len()
    }

    pub fn holds(&self, item_id: &ItemId) -> bool {
        self.rented_items.iter().any(|item| item.item_id() == item_id)
            || self.overdue_items.iter().any(|item| item.item_id() == item_id)
    }

    pub fn check_availability(&self, policy: &RentalPolicy) -> error_stack::Result<(), KernelError> {
        if self.status == RentalStatus::Locked || self.late_fee.is_outstanding() {
            return Err(Report::new(KernelError::RentalBlocked(BlockReason::Overdue))
                .attach_printable(format!("status: {}, late fee: {}", self.status, self.late_fee.as_ref())));
        }
        if self.held_count() >= *policy.max_items() {
            return Err(Report::new(KernelError::RentalBlocked(BlockReason::CapacityExceeded))
                .attach_printable(format!("holding {} of {}", self.held_count(), policy.max_items())));
        }
        Ok(())
    }

    pub fn rent(
        &self,
        policy: &RentalPolicy,
        item: ItemInfo,
        today: Date,
    ) -> error_stack::Result<Transition, KernelError> {
        self.check_availability(policy)?;
        let (item_id, title) = {
            let item = item.into_destruct();
            (item.id, item.title)
        };
        if self.holds(&item_id) {
            return Err(Report::new(KernelError::ItemAlreadyHeld)
                .attach_printable(format!("item: {}", item_id.as_ref())));
        }
        let due_date = today
            .checked_add(Duration::days(*policy.rental_period_days()))
            .ok_or_else(|| {
                Report::new(KernelError::InvalidArgument)
                    .attach_printable(format!("due date out of range from {today}"))
            })?;

        let mut next = self.clone();
        next.substitute(|rental| {
            rental
                .rented_items
                .push(RentedItem::new(item_id.clone(), title, today, due_date));
            if *rental.status == RentalStatus::Available {
                *rental.status = RentalStatus::Rented;
            }
        });
        let [inventory, catalog] = RentalNotification::item_taken(item_id);
        let points = RentalNotification::PointsCredited {
            user_id: self.user_id.clone(),
            points: *policy.points_per_rental(),
        };
        Ok(Transition::new(next, vec![inventory, catalog, points]))
    }

    pub fn return_item(
        &self,
        item_id: &ItemId,
        today: Date,
    ) -> error_stack::Result<Transition, KernelError> {
        let position = self.rented_position(item_id)?;
        let mut next = self.clone();
        next.substitute(|rental| {
            let returned = rental.rented_items.remove(position);
            rental
                .returned_items
                .push(ReturnedItem::new(returned.item_id().clone(), today));
            // Returning never lifts a lock; only release does.
            if rental.rented_items.is_empty()
                && rental.overdue_items.is_empty()
                && *rental.status != RentalStatus::Locked
            {
                *rental.status = RentalStatus::Available;
            }
        });
        Ok(Transition::new(
            next,
            RentalNotification::item_back(item_id.clone()).into(),
        ))
    }

    /// Moves a rented item to the overdue set and locks the record in one step.
    pub fn mark_overdue(&self, item_id: &ItemId) -> error_stack::Result<Transition, KernelError> {
        let position = self.rented_position(item_id)?;
        let mut next = self.clone();
        next.substitute(|rental| {
            let overdue = rental.rented_items.remove(position);
            rental.overdue_items.push(OverdueItem::from(overdue));
            *rental.status = RentalStatus::Locked;
        });
        Ok(Transition::silent(next))
    }

    /// Leaves the fee and the lock untouched.
    pub fn return_overdue_item(
        &self,
        item_id: &ItemId,
        today: Date,
    ) -> error_stack::Result<Transition, KernelError> {
        let position = self
            .overdue_items
            .iter()
            .position(|item| item.item_id() == item_id)
            .ok_or_else(|| item_not_found(item_id))?;
        let mut next = self.clone();
        next.substitute(|rental| {
            let returned = rental.overdue_items.remove(position);
            rental
                .returned_items
                .push(ReturnedItem::new(returned.item_id().clone(), today));
            if *rental.status == RentalStatus::Overdue && rental.overdue_items.is_empty() {
                *rental.status = if rental.rented_items.is_empty() {
                    RentalStatus::Available
                } else {
                    RentalStatus::Rented
                };
            }
        });
        Ok(Transition::new(
            next,
            RentalNotification::item_back(item_id.clone()).into(),
        ))
    }

    pub fn charge_late_fee(&self, amount: LateFee) -> error_stack::Result<Transition, KernelError> {
        if !amount.is_outstanding() {
            return Err(Report::new(KernelError::InvalidArgument)
                .attach_printable(format!("late fee must be positive: {}", amount.as_ref())));
        }
        let total = self.late_fee.as_ref().checked_add(*amount.as_ref()).ok_or_else(|| {
            Report::new(KernelError::InvalidArgument).attach_printable("late fee overflow")
        })?;
        let mut next = self.clone();
        next.substitute(|rental| {
            *rental.late_fee = LateFee::new(total);
            *rental.status = RentalStatus::Locked;
        });
        Ok(Transition::silent(next))
    }

    /// The only way out of `Locked`.
    pub fn release(&self) -> Transition {
        let mut next = self.clone();
        next.substitute(|rental| {
            *rental.late_fee = LateFee::default();
            *rental.status = if rental.overdue_items.is_empty() {
                RentalStatus::Available
            } else {
                RentalStatus::Overdue
            };
        });
        Transition::silent(next)
    }

    fn rented_position(&self, item_id: &ItemId) -> error_stack::Result<usize, KernelError> {
        self.rented_items
            .iter()
            .position(|item| item.item_id() == item_id)
            .ok_or_else(|| item_not_found(item_id))
    }
}

fn item_not_found(item_id: &ItemId) -> Report<KernelError> {
    Report::new(KernelError::ItemNotFound).attach_printable(format!("item: {}", item_id.as_ref()))
}

#[cfg(test)]
mod test {
    use time::macros::date;
    use uuid::Uuid;

    use crate::config::RentalPolicy;
    use crate::entity::{
        DestructTransition, ItemId, ItemInfo, ItemTitle, LateFee, Rental, RentalId, RentalStatus,
        UserId,
    };
    use crate::event::{CatalogEventType, InventoryStatus, RentalNotification};
    use crate::{BlockReason, KernelError};

    fn record() -> Rental {
        Rental::provision(RentalId::new(Uuid::new_v4()), UserId::new(Uuid::new_v4()))
    }

    fn item(title: &str) -> ItemInfo {
        ItemInfo::new(ItemId::new(Uuid::new_v4()), ItemTitle::new(title))
    }

    fn rent_all(mut rental: Rental, count: usize) -> error_stack::Result<Rental, KernelError> {
        let policy = RentalPolicy::default();
        for i in 0..count {
            rental = rental
                .rent(&policy, item(&format!("Book {i}")), date!(2024 - 01 - 01))?
                .into_destruct()
                .rental;
        }
        Ok(rental)
    }

    fn assert_capacity(rental: &Rental) {
        assert!(rental.held_count() <= *RentalPolicy::default().max_items());
    }

    #[test]
    fn rent_emits_three_notifications() -> error_stack::Result<(), KernelError> {
        let rental = record();
        let book = item("Book A");
        let item_id = book.id().clone();
        let DestructTransition {
            rental: rented,
            notifications,
        } = rental
            .rent(&RentalPolicy::default(), book, date!(2024 - 01 - 01))?
            .into_destruct();

        assert_eq!(rented.status(), &RentalStatus::Rented);
        assert_eq!(rented.rented_items().len(), 1);
        assert_eq!(rented.rented_items()[0].item_id(), &item_id);
        assert_eq!(rented.rented_items()[0].due_date(), &date!(2024 - 01 - 15));
        assert_eq!(
            notifications,
            vec![
                RentalNotification::InventoryStatusChanged {
                    item_id: item_id.clone(),
                    status: InventoryStatus::Unavailable,
                },
                RentalNotification::CatalogStatusChanged {
                    item_id,
                    event_type: CatalogEventType::RentBook,
                },
                RentalNotification::PointsCredited {
                    user_id: rental.user_id().clone(),
                    points: 30,
                },
            ]
        );
        Ok(())
    }

    #[test]
    fn return_restores_available() -> error_stack::Result<(), KernelError> {
        let book = item("Book A");
        let item_id = book.id().clone();
        let rented = record()
            .rent(&RentalPolicy::default(), book, date!(2024 - 01 - 01))?
            .into_destruct()
            .rental;

        let DestructTransition {
            rental: returned,
            notifications,
        } = rented.return_item(&item_id, date!(2024 - 01 - 05))?.into_destruct();

        assert!(returned.rented_items().is_empty());
        assert_eq!(returned.status(), &RentalStatus::Available);
        assert_eq!(returned.returned_items().len(), 1);
        assert_eq!(returned.returned_items()[0].returned_date(), &date!(2024 - 01 - 05));
        assert_eq!(
            notifications,
            vec![
                RentalNotification::InventoryStatusChanged {
                    item_id: item_id.clone(),
                    status: InventoryStatus::Available,
                },
                RentalNotification::CatalogStatusChanged {
                    item_id: item_id.clone(),
                    event_type: CatalogEventType::ReturnBook,
                },
            ]
        );

        // A replayed return is rejected instead of emitting twice.
        let replay = returned.return_item(&item_id, date!(2024 - 01 - 05));
        assert!(matches!(
            replay.map_err(|e| *e.current_context()),
            Err(KernelError::ItemNotFound)
        ));
        Ok(())
    }

    #[test]
    fn sixth_item_is_rejected() -> error_stack::Result<(), KernelError> {
        let full = rent_all(record(), 5)?;
        assert_capacity(&full);

        let result = full.rent(&RentalPolicy::default(), item("Book F"), date!(2024 - 01 - 02));
        assert!(matches!(
            result.map_err(|e| *e.current_context()),
            Err(KernelError::RentalBlocked(BlockReason::CapacityExceeded))
        ));
        assert_eq!(full.rented_items().len(), 5);
        Ok(())
    }

    #[test]
    fn outstanding_fee_blocks_regardless_of_count() -> error_stack::Result<(), KernelError> {
        let charged = record().charge_late_fee(LateFee::new(500))?.into_destruct().rental;
        assert_eq!(charged.status(), &RentalStatus::Locked);
        assert!(charged.rented_items().is_empty());

        let result = charged.rent(&RentalPolicy::default(), item("Book A"), date!(2024 - 01 - 01));
        assert!(matches!(
            result.map_err(|e| *e.current_context()),
            Err(KernelError::RentalBlocked(BlockReason::Overdue))
        ));
        Ok(())
    }

    #[test]
    fn non_positive_fee_is_invalid() {
        let result = record().charge_late_fee(LateFee::new(0));
        assert!(matches!(
            result.map_err(|e| *e.current_context()),
            Err(KernelError::InvalidArgument)
        ));
    }

    #[test]
    fn overdue_locks_and_blocks_rent() -> error_stack::Result<(), KernelError> {
        let rented = rent_all(record(), 2)?;
        let item_id = rented.rented_items()[0].item_id().clone();
        let DestructTransition {
            rental: overdue,
            notifications,
        } = rented.mark_overdue(&item_id)?.into_destruct();

        assert!(notifications.is_empty());
        assert_eq!(overdue.status(), &RentalStatus::Locked);
        assert_eq!(overdue.rented_items().len(), 1);
        assert_eq!(overdue.overdue_items().len(), 1);
        assert_eq!(overdue.overdue_items()[0].original_due_date(), &date!(2024 - 01 - 15));
        assert!(!overdue.rented_items().iter().any(|item| item.item_id() == &item_id));
        assert_capacity(&overdue);

        let result = overdue.rent(&RentalPolicy::default(), item("Book Z"), date!(2024 - 02 - 01));
        assert!(matches!(
            result.map_err(|e| *e.current_context()),
            Err(KernelError::RentalBlocked(BlockReason::Overdue))
        ));
        Ok(())
    }

    #[test]
    fn unknown_item_is_reported() -> error_stack::Result<(), KernelError> {
        let rented = rent_all(record(), 1)?;
        let stranger = ItemId::new(Uuid::new_v4());
        for result in [
            rented.return_item(&stranger, date!(2024 - 01 - 02)),
            rented.mark_overdue(&stranger),
            rented.return_overdue_item(&stranger, date!(2024 - 01 - 02)),
        ] {
            assert!(matches!(
                result.map_err(|e| *e.current_context()),
                Err(KernelError::ItemNotFound)
            ));
        }
        Ok(())
    }

    #[test]
    fn same_item_cannot_be_held_twice() -> error_stack::Result<(), KernelError> {
        let policy = RentalPolicy::default();
        let book = item("Book A");
        let rented = record()
            .rent(&policy, book.clone(), date!(2024 - 01 - 01))?
            .into_destruct()
            .rental;
        let result = rented.rent(&policy, book, date!(2024 - 01 - 02));
        assert!(matches!(
            result.map_err(|e| *e.current_context()),
            Err(KernelError::ItemAlreadyHeld)
        ));
        Ok(())
    }

    #[test]
    fn overdue_return_keeps_lock_until_release() -> error_stack::Result<(), KernelError> {
        let rented = rent_all(record(), 1)?;
        let item_id = rented.rented_items()[0].item_id().clone();
        let locked = rented.mark_overdue(&item_id)?.into_destruct().rental;

        let DestructTransition {
            rental: returned,
            notifications,
        } = locked
            .return_overdue_item(&item_id, date!(2024 - 02 - 01))?
            .into_destruct();
        assert!(returned.overdue_items().is_empty());
        assert_eq!(returned.status(), &RentalStatus::Locked);
        assert_eq!(returned.returned_items().len(), 1);
        assert_eq!(notifications, RentalNotification::item_back(item_id).to_vec());

        let released = returned.release().into_destruct().rental;
        assert_eq!(released.status(), &RentalStatus::Available);
        assert!(!released.late_fee().is_outstanding());
        Ok(())
    }

    #[test]
    fn release_with_overdue_items_stays_overdue() -> error_stack::Result<(), KernelError> {
        let rented = rent_all(record(), 3)?;
        let item_id = rented.rented_items()[0].item_id().clone();
        let locked = rented
            .mark_overdue(&item_id)?
            .into_destruct()
            .rental
            .charge_late_fee(LateFee::new(100))?
            .into_destruct()
            .rental;

        let released = locked.release().into_destruct().rental;
        assert_eq!(released.status(), &RentalStatus::Overdue);
        assert_eq!(released.late_fee(), &LateFee::default());

        // Once unlocked, renting is possible again as long as the total stays in bounds.
        let again = released
            .rent(&RentalPolicy::default(), item("Book D"), date!(2024 - 02 - 01))?
            .into_destruct()
            .rental;
        assert_eq!(again.status(), &RentalStatus::Overdue);
        assert_capacity(&again);

        let back = again
            .return_overdue_item(&item_id, date!(2024 - 02 - 02))?
            .into_destruct()
            .rental;
        assert_eq!(back.status(), &RentalStatus::Rented);
        Ok(())
    }

    #[test]
    fn release_on_clean_record_is_available() {
        let released = record().release().into_destruct().rental;
        assert_eq!(released.status(), &RentalStatus::Available);
        assert_eq!(released.late_fee(), &LateFee::default());
        assert!(released.overdue_items().is_empty());
    }

    #[test]
    fn capacity_counts_overdue_items() -> error_stack::Result<(), KernelError> {
        let full = rent_all(record(), 5)?;
        let item_id = full.rented_items()[0].item_id().clone();
        let released = full
            .mark_overdue(&item_id)?
            .into_destruct()
            .rental
            .release()
            .into_destruct()
            .rental;
        assert_eq!(released.rented_items().len(), 4);

        let result = released.rent(&RentalPolicy::default(), item("Book F"), date!(2024 - 02 - 01));
        assert!(matches!(
            result.map_err(|e| *e.current_context()),
            Err(KernelError::RentalBlocked(BlockReason::CapacityExceeded))
        ));
        Ok(())
    }

    #[test]
    fn due_date_overflow_is_rejected_not_retried() {
        let result = record().rent(&RentalPolicy::default(), item("Book Z"), time::Date::MAX);
        let error = result.map_err(|e| *e.current_context());
        assert!(matches!(error, Err(KernelError::InvalidArgument)));
        assert!(!KernelError::InvalidArgument.is_retryable());
    }
}
