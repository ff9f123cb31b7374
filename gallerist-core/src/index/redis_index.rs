use async_trait::async_trait;
use gallerist_contracts::sort::{Sortable, SortDirection, SortField};
use gallerist_model::{CollectionId, CollectionType};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, warn};

use crate::catalog::{CatalogGateway, CollectionFilter};
use crate::error::Result;

use super::{CollectionSummary, Navigation, NavigationIndex, Page, Siblings};

const VERSION_KEY: &str = "idx:version";
const CURRENT_VERSION: &str = "1";

/// Redis-backed [`NavigationIndex`]. Ranked sets use `ZADD`/`ZRANGE`/`ZRANK`;
/// the `name` field instead maintains a zero-score lexicographic set queried
/// with `ZRANGEBYLEX`/`ZREVRANGEBYLEX` (§4.2.A's tie-break decision).
#[derive(Clone)]
pub struct RedisNavigationIndex {
    conn: ConnectionManager,
}

impl RedisNavigationIndex {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn collection_type_label(kind: CollectionType) -> &'static str {
        match kind {
            CollectionType::Folder => "folder",
            CollectionType::Zip => "zip",
            CollectionType::Rar => "rar",
            CollectionType::SevenZ => "sevenz",
            CollectionType::Cbz => "cbz",
            CollectionType::Cbr => "cbr",
        }
    }

    fn numeric_key(field: SortField, direction: SortDirection) -> String {
        format!("idx:{}:{}", field.key_segment(), direction.key_segment())
    }

    fn name_lex_key() -> &'static str {
        "idxname"
    }

    fn name_member_pointer_key(id: CollectionId) -> String {
        format!("idxname:member:{}", id.to_hex())
    }

    fn data_key(id: CollectionId) -> String {
        format!("data:{}", id.to_hex())
    }

    fn thumb_key(id: CollectionId) -> String {
        format!("thumb:{}", id.to_hex())
    }

    fn effective_score(raw: f64, direction: SortDirection) -> f64 {
        match direction {
            SortDirection::Asc => raw,
            SortDirection::Desc => -raw,
        }
    }

    fn name_member(summary: &CollectionSummary) -> String {
        format!("{}\0{}", summary.name_key(), summary.id.to_hex())
    }
}

#[async_trait]
impl NavigationIndex for RedisNavigationIndex {
    async fn add_or_update(&self, summary: &CollectionSummary) -> Result<()> {
        let mut conn = self.conn.clone();
        let member = summary.id.to_hex();

        for field in SortField::ALL {
            if field == SortField::Name {
                continue;
            }
            let raw = summary
                .numeric_score(field)
                .expect("numeric fields always yield a score");
            for direction in [SortDirection::Asc, SortDirection::Desc] {
                let score = Self::effective_score(raw, direction);
                let _: () = conn
                    .zadd(Self::numeric_key(field, direction), &member, score)
                    .await?;
            }
        }

        // The name field keeps one shared lex set (score 0); direction is
        // applied at query time via ZRANGEBYLEX vs ZREVRANGEBYLEX. A prior
        // member must be removed first since renaming changes the member
        // string itself.
        let pointer_key = Self::name_member_pointer_key(summary.id);
        let previous: Option<String> = conn.get(&pointer_key).await?;
        if let Some(prev_member) = previous {
            let _: () = conn.zrem(Self::name_lex_key(), prev_member).await?;
        }
        let new_member = Self::name_member(summary);
        let _: () = conn.zadd(Self::name_lex_key(), &new_member, 0.0).await?;
        let _: () = conn.set(&pointer_key, &new_member).await?;

        let _: () = conn
            .hset_multiple(
                Self::data_key(summary.id),
                &[
                    ("id", summary.id.to_hex()),
                    ("library_id", summary.library_id.to_hex()),
                    ("name", summary.name.clone()),
                    (
                        "type",
                        Self::collection_type_label(summary.kind).to_string(),
                    ),
                    ("image_count", summary.image_count.to_string()),
                    ("total_size", summary.total_size.to_string()),
                    ("created_at", summary.created_at.to_rfc3339()),
                    ("updated_at", summary.updated_at.to_rfc3339()),
                ],
            )
            .await?;

        Ok(())
    }

    async fn remove(&self, id: CollectionId) -> Result<()> {
        let mut conn = self.conn.clone();
        let member = id.to_hex();
        for field in SortField::ALL {
            if field == SortField::Name {
                continue;
            }
            for direction in [SortDirection::Asc, SortDirection::Desc] {
                let _: () = conn.zrem(Self::numeric_key(field, direction), &member).await?;
            }
        }
        let pointer_key = Self::name_member_pointer_key(id);
        if let Some(prev_member) = conn.get::<_, Option<String>>(&pointer_key).await? {
            let _: () = conn.zrem(Self::name_lex_key(), prev_member).await?;
        }
        let _: () = conn.del(&pointer_key).await?;
        let _: () = conn.del(Self::data_key(id)).await?;
        let _: () = conn.del(Self::thumb_key(id)).await?;
        Ok(())
    }

    async fn page(
        &self,
        field: SortField,
        direction: SortDirection,
        page_num: u64,
        page_size: u64,
    ) -> Result<Page> {
        let mut conn = self.conn.clone();
        let start = page_num * page_size;
        let end = start + page_size - 1;

        if field == SortField::Name {
            let total: u64 = conn.zcard(Self::name_lex_key()).await?;
            let ids: Vec<String> = match direction {
                SortDirection::Asc => {
                    conn.zrangebylex_limit(
                        Self::name_lex_key(),
                        "-",
                        "+",
                        start as isize,
                        page_size as isize,
                    )
                    .await?
                }
                SortDirection::Desc => {
                    conn.zrevrangebylex_limit(
                        Self::name_lex_key(),
                        "+",
                        "-",
                        start as isize,
                        page_size as isize,
                    )
                    .await?
                }
            };
            let ids = ids
                .into_iter()
                .map(|m| member_to_id(&m))
                .collect::<Option<Vec<_>>>()
                .unwrap_or_default();
            return Ok(Page {
                ids,
                total,
                position_of_first: start.min(total),
            });
        }

        let key = Self::numeric_key(field, direction);
        let total: u64 = conn.zcard(&key).await?;
        let members: Vec<String> = conn.zrange(&key, start as isize, end as isize).await?;
        let ids = members
            .iter()
            .filter_map(|m| m.parse::<CollectionId>().ok())
            .collect();
        Ok(Page {
            ids,
            total,
            position_of_first: start.min(total),
        })
    }

    async fn navigation(
        &self,
        id: CollectionId,
        field: SortField,
        direction: SortDirection,
    ) -> Result<Option<Navigation>> {
        let mut conn = self.conn.clone();
        let member = id.to_hex();

        if field == SortField::Name {
            // Lexicographic rank has no direct ZRANK analogue; fall back to a
            // linear scan over the shared lex set, acceptable since `name`
            // navigation is a rare, single-id lookup rather than a hot path.
            let members: Vec<String> = conn.zrangebylex(Self::name_lex_key(), "-", "+").await?;
            let total = members.len() as u64;
            let Some(idx) = members.iter().position(|m| m.ends_with(&format!("\0{member}")))
            else {
                return Ok(None);
            };
            let ordered: Vec<String> = match direction {
                SortDirection::Asc => members,
                SortDirection::Desc => members.into_iter().rev().collect(),
            };
            let position = match direction {
                SortDirection::Asc => idx as u64,
                SortDirection::Desc => total - 1 - idx as u64,
            };
            return Ok(Some(Navigation {
                prev_id: position
                    .checked_sub(1)
                    .and_then(|p| ordered.get(p as usize))
                    .and_then(|m| member_to_id(m)),
                next_id: ordered
                    .get((position + 1) as usize)
                    .and_then(|m| member_to_id(m)),
                position,
                total,
            }));
        }

        let key = Self::numeric_key(field, direction);
        let total: u64 = conn.zcard(&key).await?;
        let Some(rank): Option<u64> = conn.zrank(&key, &member).await? else {
            return Ok(None);
        };
        let prev_id = if rank == 0 {
            None
        } else {
            let prev: Vec<String> = conn.zrange(&key, rank as isize - 1, rank as isize - 1).await?;
            prev.first().and_then(|m| m.parse().ok())
        };
        let next_id = if rank + 1 >= total {
            None
        } else {
            let next: Vec<String> = conn
                .zrange(&key, rank as isize + 1, rank as isize + 1)
                .await?;
            next.first().and_then(|m| m.parse().ok())
        };
        Ok(Some(Navigation {
            prev_id,
            next_id,
            position: rank,
            total,
        }))
    }

    async fn siblings(
        &self,
        id: CollectionId,
        field: SortField,
        direction: SortDirection,
        page_size: u64,
    ) -> Result<Option<Siblings>> {
        let Some(nav) = self.navigation(id, field, direction).await? else {
            return Ok(None);
        };
        if nav.total == 0 {
            return Ok(Some(Siblings {
                ids: vec![],
                position: 0,
                total: 0,
            }));
        }
        let (start, end) = super::siblings_window(nav.position, nav.total, page_size);

        if field == SortField::Name {
            let members: Vec<String> = self
                .conn
                .clone()
                .zrangebylex(Self::name_lex_key(), "-", "+")
                .await?;
            let ordered: Vec<String> = match direction {
                SortDirection::Asc => members,
                SortDirection::Desc => members.into_iter().rev().collect(),
            };
            let ids = ordered[start as usize..=end as usize]
                .iter()
                .filter_map(|m| member_to_id(m))
                .collect();
            return Ok(Some(Siblings {
                ids,
                position: nav.position,
                total: nav.total,
            }));
        }

        let key = Self::numeric_key(field, direction);
        let members: Vec<String> = self
            .conn
            .clone()
            .zrange(&key, start as isize, end as isize)
            .await?;
        let ids = members.iter().filter_map(|m| m.parse().ok()).collect();
        Ok(Some(Siblings {
            ids,
            position: nav.position,
            total: nav.total,
        }))
    }

    async fn get_thumbnail(&self, id: CollectionId) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn.clone();
        let bytes: Option<Vec<u8>> = conn.get(Self::thumb_key(id)).await?;
        Ok(bytes)
    }

    async fn set_thumbnail(&self, id: CollectionId, bytes: &[u8], ttl_secs: u64) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: () = conn.set_ex(Self::thumb_key(id), bytes, ttl_secs).await?;
        Ok(())
    }

    async fn batch_cache_thumbnails(
        &self,
        items: &[(CollectionId, Vec<u8>)],
        ttl_secs: u64,
    ) -> Result<()> {
        let mut pipe = redis::pipe();
        for (id, bytes) in items {
            pipe.set_ex(Self::thumb_key(*id), bytes, ttl_secs).ignore();
        }
        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn is_valid(&self) -> Result<bool> {
        let mut conn = self.conn.clone();
        match conn.get::<_, Option<String>>(VERSION_KEY).await {
            Ok(Some(v)) => Ok(v == CURRENT_VERSION),
            Ok(None) => {
                debug!("navigation index version marker absent, rebuild required");
                Ok(false)
            }
            Err(err) => {
                warn!(error = %err, "navigation index unreachable, falling back to catalog");
                Ok(false)
            }
        }
    }

    async fn rebuild(&self, catalog: &dyn CatalogGateway, batch_size: i64) -> Result<()> {
        let mut conn = self.conn.clone();
        for field in SortField::ALL {
            if field == SortField::Name {
                continue;
            }
            for direction in [SortDirection::Asc, SortDirection::Desc] {
                let _: () = conn.del(Self::numeric_key(field, direction)).await?;
            }
        }
        let _: () = conn.del(Self::name_lex_key()).await?;

        let filter = CollectionFilter::default();
        let mut skip = 0i64;
        loop {
            let batch = catalog.find_collections_paged(&filter, skip, batch_size).await?;
            if batch.is_empty() {
                break;
            }
            let batch_len = batch.len();
            for collection in &batch {
                self.add_or_update(&CollectionSummary::from(collection)).await?;
            }
            debug!(skip, batch_len, "navigation index rebuild batch applied");
            if (batch_len as i64) < batch_size {
                break;
            }
            skip += batch_size;
        }

        let _: () = conn.set(VERSION_KEY, CURRENT_VERSION).await?;
        Ok(())
    }
}

fn member_to_id(member: &str) -> Option<CollectionId> {
    member.rsplit('\0').next()?.parse().ok()
}
