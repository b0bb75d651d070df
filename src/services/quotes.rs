//! Devis with line-level and global discounts.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;

use crate::auth::role::APPROVERS;
use crate::database::models::{Quote, QuoteItem};
use crate::database::{Changes, DatabaseError, Page, PageRequest, Repository};
use crate::error::ApiError;
use crate::middleware::Actor;
use crate::notify::EntityRef;
use crate::services::transition::{self, ActionInput, TransitionSpec};
use crate::services::{next_reference, round2, today, Criteria, Detail, LIST_ORDER};
use crate::state::AppState;
use crate::validation::Validator;
use crate::workflow::machines::{QuoteStatus, QUOTE};
use crate::workflow::Action;

const TABLE: &str = "quotes";
const ITEMS: &str = "quote_items";

pub static SPEC: TransitionSpec<QuoteStatus> = TransitionSpec {
    table: TABLE,
    entity: EntityRef {
        entity_type: "quote",
        label: "Devis",
        route: "/quotes",
    },
    machine: &QUOTE,
    owner: "t.user_id",
};

#[derive(Debug, Default, Deserialize)]
pub struct QuoteQuery {
    pub status: Option<QuoteStatus>,
    pub client_id: Option<i64>,
    pub date_debut: Option<NaiveDate>,
    pub date_fin: Option<NaiveDate>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteItemInput {
    pub designation: Option<String>,
    pub quantite: Option<i32>,
    pub prix_unitaire: Option<Decimal>,
    pub remise: Option<Decimal>,
}

#[derive(Debug, Default, Deserialize)]
pub struct QuoteInput {
    pub client_id: Option<i64>,
    pub reference: Option<String>,
    pub date_creation: Option<NaiveDate>,
    pub date_validite: Option<NaiveDate>,
    pub notes: Option<String>,
    pub remise_globale: Option<Decimal>,
    pub tva: Option<Decimal>,
    pub conditions: Option<String>,
    pub items: Option<Vec<QuoteItemInput>>,
}

impl QuoteInput {
    fn validate(&self, creating: bool) -> Result<(), ApiError> {
        let hundred = Decimal::ONE_HUNDRED;
        let mut v = Validator::new();
        if creating {
            v.required("client_id", &self.client_id);
        }
        v.range_decimal("remise_globale", &self.remise_globale, Decimal::ZERO, hundred)
            .range_decimal("tva", &self.tva, Decimal::ZERO, hundred)
            .date_after("date_validite", self.date_creation, self.date_validite);
        if let Some(items) = &self.items {
            for (i, item) in items.iter().enumerate() {
                v.required_str(&format!("items.{}.designation", i), &item.designation)
                    .required(&format!("items.{}.quantite", i), &item.quantite)
                    .required(&format!("items.{}.prix_unitaire", i), &item.prix_unitaire)
                    .range_i64(&format!("items.{}.quantite", i), item.quantite.map(i64::from), 1, i64::MAX)
                    .non_negative(&format!("items.{}.prix_unitaire", i), &item.prix_unitaire)
                    .range_decimal(&format!("items.{}.remise", i), &item.remise, Decimal::ZERO, hundred);
            }
        }
        v.finish()
    }

    fn changes(&self) -> Changes {
        Changes::new()
            .set_opt("client_id", self.client_id)
            .set_opt("reference", self.reference.clone())
            .set_opt("date_creation", self.date_creation)
            .set_opt("date_validite", self.date_validite)
            .set_opt("notes", self.notes.clone())
            .set_opt("remise_globale", self.remise_globale)
            .set_opt("tva", self.tva)
            .set_opt("conditions", self.conditions.clone())
    }
}

/// One priced line: quantity, unit price and line discount in percent
#[derive(Debug, Clone, Copy)]
pub struct Line {
    pub quantite: i32,
    pub prix_unitaire: Decimal,
    pub remise: Decimal,
}

impl From<&QuoteItem> for Line {
    fn from(item: &QuoteItem) -> Self {
        Self {
            quantite: item.quantite,
            prix_unitaire: item.prix_unitaire,
            remise: item.remise,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuoteTotals {
    pub sous_total: Decimal,
    pub remise_amount: Decimal,
    pub total_ht: Decimal,
    pub tva_amount: Decimal,
    pub total_ttc: Decimal,
}

impl QuoteTotals {
    pub fn compute(lines: &[Line], remise_globale: Decimal, tva: Decimal) -> Self {
        let hundred = Decimal::ONE_HUNDRED;
        let sous_total: Decimal = lines
            .iter()
            .map(|l| Decimal::from(l.quantite) * l.prix_unitaire * (Decimal::ONE - l.remise / hundred))
            .sum();
        let remise_amount = sous_total * remise_globale / hundred;
        let total_ht = sous_total - remise_amount;
        let tva_amount = total_ht * tva / hundred;
        let total_ttc = total_ht + tva_amount;
        Self {
            sous_total: round2(sous_total),
            remise_amount: round2(remise_amount),
            total_ht: round2(total_ht),
            tva_amount: round2(tva_amount),
            total_ttc: round2(total_ttc),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuoteView {
    #[serde(flatten)]
    pub detail: Detail<Quote, QuoteItem>,
    pub totals: QuoteTotals,
}

impl QuoteView {
    fn new(quote: Quote, items: Vec<QuoteItem>) -> Self {
        let lines: Vec<Line> = items.iter().map(Line::from).collect();
        let totals = QuoteTotals::compute(&lines, quote.remise_globale, quote.tva);
        let status = quote.status;
        Self {
            detail: Detail::with_items(quote, items, &QUOTE, status),
            totals,
        }
    }
}

pub struct QuoteService {
    state: AppState,
}

impl QuoteService {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    fn repo(&self) -> Repository<Quote> {
        Repository::new(TABLE, &self.state.pool)
    }

    async fn visible(&self, id: i64, actor: &Actor) -> Result<Quote, ApiError> {
        let owner = actor.scoped_owner().map(|user_id| ("user_id", user_id));
        Ok(self.repo().find(id, owner).await?)
    }

    pub async fn list(&self, query: &QuoteQuery, actor: &Actor) -> Result<Page<Quote>, ApiError> {
        let criteria = Criteria::new()
            .eq_opt("status", query.status.map(QuoteStatus::to_filter))
            .eq_opt("client_id", query.client_id)
            .date_range("date_creation", query.date_debut, query.date_fin)
            .owned_by("user_id", actor.scoped_owner())
            .build();
        let request = PageRequest::new(query.page, query.per_page);
        Ok(self.repo().page(criteria, LIST_ORDER, &request).await?)
    }

    pub async fn show(&self, id: i64, actor: &Actor) -> Result<QuoteView, ApiError> {
        let quote = self.visible(id, actor).await?;
        let mut conn = self.state.pool.acquire().await?;
        let items = load_items(&mut *conn, id).await?;
        Ok(QuoteView::new(quote, items))
    }

    pub async fn totals(&self, id: i64, actor: &Actor) -> Result<QuoteTotals, ApiError> {
        Ok(self.show(id, actor).await?.totals)
    }

    /// Quotes start as drafts; nobody is notified until they are sent
    pub async fn create(&self, input: QuoteInput, actor: &Actor) -> Result<QuoteView, ApiError> {
        input.validate(true)?;
        let date = input.date_creation.unwrap_or_else(today);

        let mut tx = self.state.pool.begin().await?;
        let reference = match input.reference.clone() {
            Some(reference) => reference,
            None => next_reference(&mut *tx, TABLE, "reference", &reference_prefix(date), 4).await?,
        };
        let quote: Quote = input
            .changes()
            .set("reference", reference)
            .set("date_creation", date)
            .set("status", QUOTE.initial)
            .set("user_id", actor.user_id)
            .insert(TABLE, &mut *tx)
            .await?;
        let items = insert_items(&mut *tx, quote.id, input.items.as_deref().unwrap_or_default()).await?;
        tx.commit().await?;

        tracing::info!(quote_id = quote.id, reference = %quote.reference, "quote created");
        Ok(QuoteView::new(quote, items))
    }

    pub async fn update(&self, id: i64, input: QuoteInput, actor: &Actor) -> Result<QuoteView, ApiError> {
        input.validate(false)?;
        self.visible(id, actor).await?;

        let mut tx = self.state.pool.begin().await?;
        let current: QuoteStatus = transition::locked_status(&mut *tx, TABLE, id).await?;
        QUOTE.ensure_editable(current)?;
        let quote: Quote = input.changes().update(TABLE, id, &mut *tx).await?;
        let items = match &input.items {
            Some(items) => {
                sqlx::query("DELETE FROM quote_items WHERE quote_id = $1")
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                insert_items(&mut *tx, id, items).await?
            }
            None => load_items(&mut *tx, id).await?,
        };
        tx.commit().await?;
        Ok(QuoteView::new(quote, items))
    }

    pub async fn delete(&self, id: i64, actor: &Actor) -> Result<(), ApiError> {
        self.visible(id, actor).await?;
        transition::delete_guarded(&self.state, TABLE, &QUOTE, id).await
    }

    pub async fn act(&self, id: i64, action: Action, input: ActionInput, actor: &Actor) -> Result<Quote, ApiError> {
        self.visible(id, actor).await?;
        let (extras, reason) = match action {
            Action::Accept => {
                actor.require(APPROVERS)?;
                let extras = Changes::new()
                    .set("accepted_by", actor.user_id)
                    .set("accepted_at", Utc::now());
                (extras, None)
            }
            Action::Reject => {
                actor.require(APPROVERS)?;
                let reason = input.require_reason()?;
                (Changes::new().set("rejection_reason", reason.clone()), Some(reason))
            }
            _ => (Changes::new(), None),
        };
        transition::transition(&self.state, &SPEC, id, actor, action, extras, reason.as_deref()).await
    }

    /// New draft with today's date, a fresh reference and the same lines
    pub async fn duplicate(&self, id: i64, actor: &Actor) -> Result<QuoteView, ApiError> {
        let original = self.visible(id, actor).await?;
        let date = today();

        let mut tx = self.state.pool.begin().await?;
        let lines: Vec<QuoteItemInput> = load_items(&mut *tx, id)
            .await?
            .into_iter()
            .map(|item| QuoteItemInput {
                designation: Some(item.designation),
                quantite: Some(item.quantite),
                prix_unitaire: Some(item.prix_unitaire),
                remise: Some(item.remise),
            })
            .collect();
        let reference = next_reference(&mut *tx, TABLE, "reference", &reference_prefix(date), 4).await?;
        let copy: Quote = Changes::new()
            .set("client_id", original.client_id)
            .set("reference", reference)
            .set("date_creation", date)
            .set("date_validite", original.date_validite)
            .set("notes", original.notes)
            .set("remise_globale", original.remise_globale)
            .set("tva", original.tva)
            .set("conditions", original.conditions)
            .set("status", QUOTE.initial)
            .set("user_id", actor.user_id)
            .insert(TABLE, &mut *tx)
            .await?;
        let items = insert_items(&mut *tx, copy.id, &lines).await?;
        tx.commit().await?;

        tracing::info!(from = id, quote_id = copy.id, "quote duplicated");
        Ok(QuoteView::new(copy, items))
    }
}

fn reference_prefix(date: NaiveDate) -> String {
    format!("DV-{}-", date.format("%Y%m%d"))
}

async fn load_items(conn: &mut PgConnection, quote_id: i64) -> Result<Vec<QuoteItem>, DatabaseError> {
    Ok(
        sqlx::query_as::<_, QuoteItem>("SELECT * FROM quote_items WHERE quote_id = $1 ORDER BY id")
            .bind(quote_id)
            .fetch_all(conn)
            .await?,
    )
}

async fn insert_items(
    conn: &mut PgConnection,
    quote_id: i64,
    items: &[QuoteItemInput],
) -> Result<Vec<QuoteItem>, DatabaseError> {
    let mut inserted = Vec::with_capacity(items.len());
    for item in items {
        let row: QuoteItem = Changes::new()
            .set("quote_id", quote_id)
            .set("designation", item.designation.clone().unwrap_or_default())
            .set("quantite", item.quantite.unwrap_or(1))
            .set("prix_unitaire", item.prix_unitaire.unwrap_or(Decimal::ZERO))
            .set("remise", item.remise.unwrap_or(Decimal::ZERO))
            .insert(ITEMS, &mut *conn)
            .await?;
        inserted.push(row);
    }
    Ok(inserted)
}
