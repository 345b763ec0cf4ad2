// URL-keyed metadata memo for the session.
// - The cached metadata is only valid for `current_url`; changing the URL drops it.
// - At most one fetch is tracked; a newer ticket supersedes an older one.
// - A completion carrying a stale ticket is ignored.
use crate::model::Metadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket(u64);

#[derive(Debug, Clone)]
struct InFlight {
    ticket: FetchTicket,
    url: String,
}

#[derive(Debug, PartialEq, Eq)]
pub enum FetchOutcome<'a> {
    Stored(&'a Metadata),
    Failed(String),
    Stale,
}

#[derive(Debug, Default)]
pub struct MetadataCache {
    current_url: String,
    metadata: Option<Metadata>,
    in_flight: Option<InFlight>,
    issued: u64,
}

impl MetadataCache {
    pub fn current_url(&self) -> &str {
        &self.current_url
    }

    pub fn metadata(&self) -> Option<&Metadata> {
        self.metadata.as_ref()
    }

    /// Cached metadata for `url`, if it is the current URL and a fetch for it finished.
    pub fn lookup(&self, url: &str) -> Option<&Metadata> {
        (self.current_url == url)
            .then_some(self.metadata.as_ref())
            .flatten()
    }

    pub fn is_fetching(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight_for(&self, url: &str) -> Option<FetchTicket> {
        self.in_flight
            .as_ref()
            .filter(|f| f.url == url)
            .map(|f| f.ticket)
    }

    /// Points the cache at `url`. A different URL invalidates the cached metadata.
    pub fn set_url(&mut self, url: &str) {
        if self.current_url != url {
            self.current_url = url.to_string();
            self.metadata = None;
        }
    }

    /// Registers a new fetch for `url`, superseding any outstanding one.
    pub fn begin(&mut self, url: &str) -> FetchTicket {
        self.set_url(url);
        self.metadata = None;
        self.issued += 1;
        let ticket = FetchTicket(self.issued);
        self.in_flight = Some(InFlight {
            ticket,
            url: url.to_string(),
        });
        ticket
    }

    pub fn complete(
        &mut self,
        ticket: FetchTicket,
        result: Result<Metadata, String>,
    ) -> FetchOutcome<'_> {
        let Some(in_flight) = self.in_flight.take_if(|f| f.ticket == ticket) else {
            return FetchOutcome::Stale;
        };

        match result {
            Ok(metadata) => {
                self.current_url = in_flight.url;
                FetchOutcome::Stored(self.metadata.insert(metadata))
            }
            Err(message) => {
                self.metadata = None;
                FetchOutcome::Failed(message)
            }
        }
    }
}
