//! Paper execution gateway.
//!
//! Simulates fills locally with configurable slippage and commission. This
//! gateway makes **zero API calls**; it is impossible to execute real
//! trades through it. It keeps its own book of open positions so startup
//! reconciliation can be exercised against it, and failures can be scripted
//! for tests.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use stealth_trade_core::{
    BrokerPosition, ExecutionGateway, FillReport, GatewayError, OrderTicket, Position, Side,
};

pub struct PaperGateway {
    commission_rate: Decimal,
    slippage_bps: Decimal,
    book: Mutex<HashMap<String, BrokerPosition>>,
    scripted_failures: Mutex<VecDeque<GatewayError>>,
    order_seq: AtomicU64,
}

impl PaperGateway {
    /// Creates a paper gateway.
    ///
    /// # Arguments
    ///
    /// * `commission_rate` - Commission as a decimal (e.g., 0.001 = 0.1%)
    /// * `slippage_bps` - Slippage in basis points (e.g., 10.0 = 0.1%)
    #[must_use]
    pub fn new(commission_rate: f64, slippage_bps: f64) -> Self {
        Self {
            commission_rate: Decimal::try_from(commission_rate).unwrap_or(Decimal::ZERO),
            slippage_bps: Decimal::try_from(slippage_bps).unwrap_or(Decimal::ZERO),
            book: Mutex::new(HashMap::new()),
            scripted_failures: Mutex::new(VecDeque::new()),
            order_seq: AtomicU64::new(1),
        }
    }

    /// Queues an error to be returned by the next order submission.
    pub fn script_failure(&self, error: GatewayError) {
        self.scripted_failures
            .lock()
            .expect("failure queue poisoned")
            .push_back(error);
    }

    /// Seeds a broker-side position, e.g. an out-of-band fill the engine
    /// never saw. Used to exercise reconciliation.
    pub fn seed_position(&self, position: BrokerPosition) {
        self.book
            .lock()
            .expect("paper book poisoned")
            .insert(position.symbol.clone(), position);
    }

    fn take_scripted_failure(&self) -> Option<GatewayError> {
        self.scripted_failures
            .lock()
            .expect("failure queue poisoned")
            .pop_front()
    }

    /// Fill price adverse to the order direction by the configured slippage.
    fn slip(&self, reference: Decimal, buying: bool) -> Decimal {
        let factor = self.slippage_bps / Decimal::from(10_000);
        if buying {
            reference * (Decimal::ONE + factor)
        } else {
            reference * (Decimal::ONE - factor)
        }
    }

    fn next_order_id(&self) -> String {
        format!("paper-{}", self.order_seq.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl ExecutionGateway for PaperGateway {
    async fn open(&self, ticket: &OrderTicket) -> Result<FillReport, GatewayError> {
        if let Some(error) = self.take_scripted_failure() {
            return Err(error);
        }

        let Some(reference) = ticket.price else {
            return Err(GatewayError::Unknown(
                "paper gateway needs a reference price".to_string(),
            ));
        };

        // Opening a long buys; opening a short sells.
        let price = self.slip(reference, ticket.side.is_long());
        let commission = price * Decimal::from(ticket.quantity) * self.commission_rate;

        let fill = FillReport {
            order_id: self.next_order_id(),
            symbol: ticket.symbol.clone(),
            side: ticket.side,
            quantity: ticket.quantity,
            price,
            commission,
            timestamp: Utc::now(),
        };

        self.book.lock().expect("paper book poisoned").insert(
            ticket.symbol.clone(),
            BrokerPosition {
                symbol: ticket.symbol.clone(),
                side: ticket.side,
                quantity: ticket.quantity,
                avg_price: price,
            },
        );

        tracing::debug!(symbol = %fill.symbol, price = %fill.price, "paper open filled");
        Ok(fill)
    }

    async fn close(&self, position: &Position, mark: Decimal) -> Result<FillReport, GatewayError> {
        if let Some(error) = self.take_scripted_failure() {
            return Err(error);
        }

        // Closing a long sells; closing a short buys.
        let price = self.slip(mark, !position.side.is_long());
        let commission = price * Decimal::from(position.quantity) * self.commission_rate;

        self.book
            .lock()
            .expect("paper book poisoned")
            .remove(&position.symbol);

        let fill = FillReport {
            order_id: self.next_order_id(),
            symbol: position.symbol.clone(),
            side: position.side.opposite(),
            quantity: position.quantity,
            price,
            commission,
            timestamp: Utc::now(),
        };
        tracing::debug!(symbol = %fill.symbol, price = %fill.price, "paper close filled");
        Ok(fill)
    }

    async fn open_positions(&self) -> Result<Vec<BrokerPosition>, GatewayError> {
        Ok(self
            .book
            .lock()
            .expect("paper book poisoned")
            .values()
            .cloned()
            .collect())
    }
}
