//! Messaging session: the explicit context object tying the local identity,
//! key material, registry, and posting substrate together.
//!
//! Every send and read operation goes through a [`MessagingSession`]; there
//! is no process-wide client state. The posting substrate itself (login,
//! timelines, feeds) stays external — the session only needs to publish text
//! and to classify post bodies handed to it.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::cipher::{seal, unseal};
use crate::error::{Result, SealpostError};
use crate::keys::{Keypair, PortablePublicKey, PublicKey};
use crate::limits::WireLimits;
use crate::policy::{can_attempt_decrypt, handles_match};
use crate::registry::KeyRegistry;
use crate::wire;

/// Handle to a created post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostRef {
    pub uri: String,
    pub cid: String,
}

/// A post as surfaced by the feed, reduced to what envelope handling needs.
#[derive(Debug, Clone)]
pub struct Post {
    pub uri: String,
    /// Handle of the post's author.
    pub author_handle: String,
    /// The post body, scanned for the envelope shape.
    pub text: String,
}

/// Contract for the external posting substrate.
#[async_trait]
pub trait PostingSubstrate: Send + Sync {
    /// Publish a text post, returning its handle.
    async fn post(&self, text: &str) -> Result<PostRef>;
}

/// What a post looks like to the local user after envelope handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostView {
    /// Not an envelope; render the text as-is.
    Plain,
    /// An envelope addressed to someone else; show the locked placeholder
    /// and the intended recipient, never a decrypt action.
    Locked { recipient_handle: String },
    /// An envelope this user may and did open.
    Decrypted { plaintext: String },
    /// An envelope this user should be able to open but could not. The
    /// reason is deliberately not surfaced.
    Undecryptable,
}

/// Per-identity messaging context.
pub struct MessagingSession<R, P> {
    handle: String,
    keypair: Keypair,
    registry: R,
    substrate: P,
    limits: WireLimits,
}

impl<R: KeyRegistry, P: PostingSubstrate> MessagingSession<R, P> {
    /// Create a session for `handle` with its loaded keypair.
    pub fn new(
        handle: impl Into<String>,
        keypair: Keypair,
        registry: R,
        substrate: P,
        limits: WireLimits,
    ) -> Self {
        Self {
            handle: handle.into(),
            keypair,
            registry,
            substrate,
            limits,
        }
    }

    /// The local user's handle.
    pub fn handle(&self) -> &str {
        &self.handle
    }

    /// The registry this session talks to.
    pub fn registry(&self) -> &R {
        &self.registry
    }

    /// The posting substrate this session publishes through.
    pub fn substrate(&self) -> &P {
        &self.substrate
    }

    /// Maximum plaintext bytes for a message to `recipient_handle`.
    pub fn max_plaintext_len(&self, recipient_handle: &str) -> usize {
        self.limits.max_plaintext_len(recipient_handle)
    }

    /// Publish the local public key to the registry.
    pub async fn publish_key(&self) -> Result<()> {
        let portable = PortablePublicKey::from_public(&self.keypair.public);
        self.registry.publish(&self.handle, &portable).await?;
        info!(handle = %self.handle, "published encryption key");
        Ok(())
    }

    /// Encrypt `plaintext` for `recipient_handle` and post the envelope.
    ///
    /// The length check runs before anything else, so an oversized message
    /// costs neither a registry round trip nor any crypto work. The
    /// recipient's key is always looked up fresh — never cached — so a
    /// rotated key cannot be missed.
    pub async fn send_encrypted(
        &self,
        recipient_handle: &str,
        plaintext: &str,
    ) -> Result<PostRef> {
        self.limits.check_plaintext(plaintext, recipient_handle)?;

        let recipient_key = self.lookup_required(recipient_handle).await?;
        let envelope = seal(
            plaintext,
            &recipient_key,
            &self.keypair,
            &self.limits,
            recipient_handle,
        )?;

        let body = wire::wrap(recipient_handle, &wire::encode(&envelope));
        let post_ref = self.substrate.post(&body).await?;
        info!(recipient = %recipient_handle, uri = %post_ref.uri, "posted encrypted message");
        Ok(post_ref)
    }

    /// Classify and, where permitted, decrypt a post body.
    ///
    /// Registry failures on the sender-reopen path are surfaced as typed
    /// errors; everything decryption-related collapses to
    /// [`SealpostError::Decryption`].
    pub async fn read_post(&self, post: &Post) -> Result<PostView> {
        let parts = match wire::unwrap(&post.text) {
            Some(parts) => parts,
            None => return Ok(PostView::Plain),
        };

        if !can_attempt_decrypt(&parts.recipient_handle, &post.author_handle, &self.handle) {
            debug!(uri = %post.uri, recipient = %parts.recipient_handle, "not addressed to us");
            return Ok(PostView::Locked {
                recipient_handle: parts.recipient_handle,
            });
        }

        let envelope = wire::decode(&parts.token).map_err(|_| SealpostError::Decryption)?;

        // The agreement counterpart differs by which side we are on: the
        // recipient uses the sender key embedded in the envelope; the author
        // re-opening their own message needs the recipient's published key.
        let counterpart: PublicKey = if handles_match(&self.handle, &post.author_handle) {
            self.lookup_required(&parts.recipient_handle).await?
        } else {
            envelope.sender_public.clone()
        };

        let plaintext = unseal(&envelope, &counterpart, &self.keypair)?;
        Ok(PostView::Decrypted { plaintext })
    }

    /// Classify a batch of posts. Per-post decryption failures degrade to
    /// [`PostView::Undecryptable`] instead of aborting the scan; registry
    /// failures do abort, since they are transient and retryable.
    pub async fn scan_feed(&self, posts: &[Post]) -> Result<Vec<PostView>> {
        let mut views = Vec::with_capacity(posts.len());
        for post in posts {
            match self.read_post(post).await {
                Ok(view) => views.push(view),
                Err(SealpostError::Registry(e)) => {
                    return Err(SealpostError::Registry(e));
                }
                Err(err) => {
                    warn!(uri = %post.uri, error = %err, "failed to open envelope");
                    views.push(PostView::Undecryptable);
                }
            }
        }
        Ok(views)
    }

    async fn lookup_required(&self, handle: &str) -> Result<PublicKey> {
        match self.registry.lookup(handle).await? {
            Some(portable) => portable.to_public(),
            None => Err(SealpostError::RecipientKeyNotFound(handle.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Mock substrate
// ---------------------------------------------------------------------------

/// In-memory posting substrate for tests, with a log of published posts.
#[derive(Default)]
pub struct MockSubstrate {
    posts: std::sync::Mutex<Vec<String>>,
}

impl MockSubstrate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bodies of all posts published so far.
    pub fn posts(&self) -> Vec<String> {
        self.posts.lock().unwrap().clone()
    }

    /// Number of posts published so far.
    pub fn post_count(&self) -> usize {
        self.posts.lock().unwrap().len()
    }
}

#[async_trait]
impl PostingSubstrate for MockSubstrate {
    async fn post(&self, text: &str) -> Result<PostRef> {
        let mut posts = self.posts.lock().unwrap();
        posts.push(text.to_string());
        let n = posts.len();
        Ok(PostRef {
            uri: format!("at://mock/app.feed.post/{}", n),
            cid: format!("cid-{}", n),
        })
    }
}
